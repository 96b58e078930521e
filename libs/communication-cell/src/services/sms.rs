use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::models::{CommunicationError, TwilioSettings};
use crate::services::render;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// SMS delivery through the Twilio Messages REST API.
pub struct SmsService {
    client: Client,
    settings: TwilioSettings,
    api_base: String,
}

impl SmsService {
    pub fn new(settings: TwilioSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_api_base(settings: TwilioSettings, api_base: String) -> Self {
        Self {
            client: Client::new(),
            settings,
            api_base,
        }
    }

    /// Sends a rendered message to each number. Returns one result entry per
    /// recipient rather than failing the whole batch.
    pub async fn send_sms(
        &self,
        to: &[String],
        message: &str,
        template_data: &Value,
    ) -> Result<Vec<Value>, CommunicationError> {
        let rendered = render::render_template(message, template_data);
        if rendered.chars().count() > 1600 {
            warn!(
                "SMS body very long ({} chars), carrier will fragment it",
                rendered.chars().count()
            );
        }

        let mut results = Vec::with_capacity(to.len());
        for phone in to {
            let formatted = render::format_spanish_number(phone);
            if !render::is_valid_spanish_mobile(&formatted) {
                results.push(json!({
                    "phone": phone,
                    "success": false,
                    "error": "Invalid phone number format"
                }));
                continue;
            }

            match self.deliver(&formatted, &rendered).await {
                Ok(mut result) => {
                    if let Some(obj) = result.as_object_mut() {
                        obj.insert("phone".to_string(), json!(phone));
                    }
                    results.push(result);
                }
                Err(e) => {
                    error!("SMS to {} failed: {}", formatted, e);
                    results.push(json!({
                        "phone": phone,
                        "success": false,
                        "error": e.to_string()
                    }));
                }
            }
        }

        let sent = results
            .iter()
            .filter(|r| r["success"].as_bool().unwrap_or(false))
            .count();
        info!("SMS sent: {}/{}", sent, results.len());

        Ok(results)
    }

    async fn deliver(&self, phone: &str, body: &str) -> Result<Value, CommunicationError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.settings.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", phone),
                ("From", self.settings.from_number.as_str()),
                ("Body", body),
            ])
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| CommunicationError::DeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CommunicationError::DeliveryFailed(format!(
                "Twilio returned {}: {}",
                status, text
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CommunicationError::DeliveryFailed(e.to_string()))?;

        Ok(json!({
            "success": true,
            "message_id": payload.get("sid"),
            "status": payload.get("status"),
            "segments": render::sms_segments(body),
            "timestamp": chrono::Utc::now()
        }))
    }

    /// Verifies the credentials by fetching the account resource.
    pub async fn test_connection(&self) -> Result<Value, CommunicationError> {
        let url = format!(
            "{}/Accounts/{}.json",
            self.api_base, self.settings.account_sid
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| CommunicationError::DeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(json!({
                "success": false,
                "error": format!("Twilio returned {}", response.status())
            }));
        }

        let account: Value = response
            .json()
            .await
            .map_err(|e| CommunicationError::DeliveryFailed(e.to_string()))?;

        Ok(json!({
            "success": true,
            "account_name": account.get("friendly_name"),
            "status": account.get("status"),
            "message": "Twilio connection ok"
        }))
    }

    pub fn estimate_cost(&self, phone: &str, message: &str) -> Value {
        let (segments, total_price) = render::estimate_sms_cost(message);
        json!({
            "phone": phone,
            "segments": segments,
            "price_per_segment": render::SMS_PRICE_PER_SEGMENT_EUR,
            "total_price": total_price,
            "currency": "EUR",
            "message_length": message.chars().count()
        })
    }

    /// Personalised bulk send. Each recipient entry carries its own template
    /// variables next to the phone number.
    pub async fn send_bulk(
        &self,
        recipients: &[Value],
        message_template: &str,
    ) -> Result<Value, CommunicationError> {
        let mut results = Vec::new();

        for recipient in recipients {
            let Some(phone) = recipient.get("phone").and_then(|p| p.as_str()) else {
                continue;
            };
            let mut data = recipient.clone();
            if let Some(obj) = data.as_object_mut() {
                obj.remove("phone");
            }
            let mut batch = self
                .send_sms(&[phone.to_string()], message_template, &data)
                .await?;
            results.append(&mut batch);
        }

        let total = results.len();
        let success = results
            .iter()
            .filter(|r| r["success"].as_bool().unwrap_or(false))
            .count();
        let rate = if total > 0 {
            ((success as f64 / total as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(json!({
            "total": total,
            "success": success,
            "failed": total - success,
            "success_rate": rate,
            "results": results
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> TwilioSettings {
        TwilioSettings {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_number: "+34600000000".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_valid_numbers_and_flags_bad_ones() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM1",
                "status": "queued"
            })))
            .mount(&server)
            .await;

        let service = SmsService::with_api_base(settings(), server.uri());
        let results = service
            .send_sms(
                &["612345678".to_string(), "12345".to_string()],
                "Hola {{ patient_name }}",
                &serde_json::json!({ "patient_name": "Ana" }),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["success"], true);
        assert_eq!(results[0]["message_id"], "SM1");
        assert_eq!(results[1]["success"], false);
    }

    #[tokio::test]
    async fn reports_twilio_errors_per_recipient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let service = SmsService::with_api_base(settings(), server.uri());
        let results = service
            .send_sms(
                &["612345678".to_string()],
                "Hola",
                &serde_json::Value::Null,
            )
            .await
            .unwrap();

        assert_eq!(results[0]["success"], false);
    }

    #[test]
    fn cost_estimate_includes_segments() {
        let service = SmsService::new(settings());
        let estimate = service.estimate_cost("+34612345678", &"a".repeat(200));
        assert_eq!(estimate["segments"], 2);
        assert_eq!(estimate["total_price"], 0.12);
    }
}
