use regex::Regex;
use serde_json::Value;

/// Substitutes `{{ variable }}` placeholders with values from `data`.
/// Unknown placeholders are left untouched.
pub fn render_template(template: &str, data: &Value) -> String {
    let Some(map) = data.as_object() else {
        return template.to_string();
    };

    let mut rendered = template.to_string();
    for (key, value) in map {
        let pattern = format!(r"\{{\{{\s*{}\s*\}}\}}", regex::escape(key));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = re.replace_all(&rendered, replacement.as_str()).into_owned();
    }
    rendered
}

/// Plain-text fallback for HTML email bodies. Strips tags, turns `<br>` and
/// paragraph boundaries into newlines and decodes the common entities.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for c in html.chars() {
        if in_tag {
            if c == '>' {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .trim_end_matches('/')
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if name == "br" || name == "p" {
                    text.push('\n');
                }
                tag.clear();
            } else {
                tag.push(c);
            }
        } else if c == '<' {
            in_tag = true;
        } else {
            text.push(c);
        }
    }

    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");

    let mut collapsed = String::with_capacity(text.len());
    let mut newlines = 0u32;
    let mut last_space = false;
    for c in text.chars() {
        match c {
            '\n' => {
                newlines += 1;
                last_space = false;
                if newlines <= 2 {
                    collapsed.push('\n');
                }
            }
            ' ' => {
                if !last_space {
                    collapsed.push(' ');
                }
                last_space = true;
            }
            _ => {
                newlines = 0;
                last_space = false;
                collapsed.push(c);
            }
        }
    }
    collapsed.trim().to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

/// Normalizes a Spanish phone number to `+34XXXXXXXXX`. Numbers that do not
/// fit a known shape are returned unchanged.
pub fn format_spanish_number(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let cleaned = cleaned.trim_start_matches('+');
    let cleaned = cleaned.strip_prefix("00").unwrap_or(cleaned);

    if cleaned.len() == 9 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        format!("+34{}", cleaned)
    } else if cleaned.len() == 11 && cleaned.starts_with("34") {
        format!("+{}", cleaned)
    } else {
        phone.to_string()
    }
}

/// Spanish mobile numbers start with 6-9 after the country code.
pub fn is_valid_spanish_mobile(phone: &str) -> bool {
    Regex::new(r"^\+34[6-9]\d{8}$")
        .map(|re| re.is_match(phone))
        .unwrap_or(false)
}

/// SMS segment count. GSM-7 messages fit 160 chars in one segment and 153
/// per segment when concatenated; messages with non-ASCII characters fall
/// back to UCS-2 limits of 70 and 67.
pub fn sms_segments(message: &str) -> u32 {
    let has_special = message.chars().any(|c| c as u32 > 127);
    let (single_limit, concat_limit) = if has_special { (70, 67) } else { (160, 153) };

    let len = message.chars().count() as u32;
    if len <= single_limit {
        1
    } else {
        len.div_ceil(concat_limit)
    }
}

pub const SMS_PRICE_PER_SEGMENT_EUR: f64 = 0.06;

pub fn estimate_sms_cost(message: &str) -> (u32, f64) {
    let segments = sms_segments(message);
    let total = segments as f64 * SMS_PRICE_PER_SEGMENT_EUR;
    (segments, (total * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_placeholders_with_flexible_spacing() {
        let data = json!({ "patient_name": "Ana", "appointment_time": "10:30" });
        let out = render_template("Hola {{patient_name}}, tu cita es a las {{ appointment_time }}", &data);
        assert_eq!(out, "Hola Ana, tu cita es a las 10:30");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let out = render_template("Hola {{ patient_name }}", &json!({ "other": "x" }));
        assert_eq!(out, "Hola {{ patient_name }}");
    }

    #[test]
    fn html_fallback_keeps_line_breaks() {
        let text = html_to_text("<p>Hola <b>Ana</b></p><p>Tu cita &amp; revisi\u{f3}n</p>");
        assert_eq!(text, "Hola Ana\n\nTu cita & revisi\u{f3}n");
    }

    #[test]
    fn normalizes_spanish_numbers() {
        assert_eq!(format_spanish_number("612 345 678"), "+34612345678");
        assert_eq!(format_spanish_number("34612345678"), "+34612345678");
        assert_eq!(format_spanish_number("+34 612-345-678"), "+34612345678");
        assert_eq!(format_spanish_number("12345"), "12345");
    }

    #[test]
    fn validates_spanish_mobiles() {
        assert!(is_valid_spanish_mobile("+34612345678"));
        assert!(is_valid_spanish_mobile("+34912345678"));
        assert!(!is_valid_spanish_mobile("+34512345678"));
        assert!(!is_valid_spanish_mobile("612345678"));
    }

    #[test]
    fn counts_sms_segments() {
        assert_eq!(sms_segments(&"a".repeat(160)), 1);
        assert_eq!(sms_segments(&"a".repeat(161)), 2);
        assert_eq!(sms_segments(&"a".repeat(306)), 2);
        assert_eq!(sms_segments(&"a".repeat(307)), 3);
        // Accents force UCS-2 limits
        let accented = format!("\u{e1}{}", "a".repeat(70));
        assert_eq!(sms_segments(&accented), 2);
    }

    #[test]
    fn estimates_cost_per_segment() {
        let (segments, price) = estimate_sms_cost(&"a".repeat(161));
        assert_eq!(segments, 2);
        assert_eq!(price, 0.12);
    }

    #[test]
    fn validates_email_addresses() {
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana@"));
        assert!(!is_valid_email("example.com"));
    }
}
