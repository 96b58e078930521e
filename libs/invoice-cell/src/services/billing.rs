use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::models::{
    EmitterData, InvoiceLine, InvoiceLineInput, ReceiverData, VatRate,
};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes the taxable base, VAT amount and total for one invoice line.
/// The discount is a percentage applied before tax.
pub fn compute_line(input: &InvoiceLineInput) -> InvoiceLine {
    let line_subtotal = input.quantity * input.unit_price;
    let discount_amount = if input.discount_pct > 0.0 {
        line_subtotal * (input.discount_pct / 100.0)
    } else {
        0.0
    };
    let taxable_base = line_subtotal - discount_amount;
    let vat_amount = taxable_base * input.vat_rate.rate();
    let line_total = taxable_base + vat_amount;

    InvoiceLine {
        concept: input.concept.clone(),
        quantity: input.quantity,
        unit_price: input.unit_price,
        discount_pct: input.discount_pct,
        vat_rate: input.vat_rate,
        taxable_base: round2(taxable_base),
        vat_amount: round2(vat_amount),
        line_total: round2(line_total),
    }
}

pub struct InvoiceTotals {
    pub subtotal: f64,
    pub total_vat: f64,
    pub total: f64,
}

pub fn compute_totals(lines: &[InvoiceLine]) -> InvoiceTotals {
    let subtotal: f64 = lines.iter().map(|l| l.taxable_base).sum();
    let total_vat: f64 = lines.iter().map(|l| l.vat_amount).sum();
    let total: f64 = lines.iter().map(|l| l.line_total).sum();

    InvoiceTotals {
        subtotal: round2(subtotal),
        total_vat: round2(total_vat),
        total: round2(total),
    }
}

/// Next correlative number in the series, e.g. `F2026-A0042`.
pub fn next_invoice_number(series: &str, year: i32, last_sequence: u32) -> String {
    format!("F{}-{}{:04}", year, series, last_sequence + 1)
}

/// Recovers the sequence from a stored invoice number. `F2026-A0042` yields
/// 42. Numbers that do not follow the scheme count as zero so the sequence
/// restarts rather than panicking over legacy data.
pub fn parse_sequence(number: &str) -> u32 {
    number
        .split('-')
        .nth(1)
        .and_then(|part| part.get(1..))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// SHA-256 over the canonical JSON of the fields that legally identify the
/// invoice. Keys are sorted so the digest is independent of field order.
pub fn verification_hash(
    number: &str,
    issue_date: &DateTime<Utc>,
    emitter_nif: &str,
    receiver_name: &str,
    total: f64,
) -> String {
    let mut fields = BTreeMap::new();
    fields.insert("emitter_nif", emitter_nif.to_string());
    fields.insert("issue_date", issue_date.to_rfc3339());
    fields.insert("number", number.to_string());
    fields.insert("receiver_name", receiver_name.to_string());
    fields.insert("total", format!("{:.2}", total));

    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Payload encoded into the invoice QR. The frontend renders the actual
/// image from this JSON.
pub fn qr_payload(
    emitter_nif: &str,
    issue_date: &DateTime<Utc>,
    number: &str,
    total: f64,
    total_vat: f64,
    hash: &str,
    verification_base_url: &str,
) -> String {
    serde_json::json!({
        "version": "1.0",
        "document_type": "FC",
        "emitter_id": emitter_nif,
        "issue_date": issue_date.format("%Y-%m-%d").to_string(),
        "invoice_number": number,
        "total_amount": format!("{:.2}", total),
        "total_vat": format!("{:.2}", total_vat),
        "verification_hash": hash,
        "verification_url": format!("{}/facturas/{}", verification_base_url, number)
    })
    .to_string()
}

/// Basic Spanish NIF/CIF check: CIF is a letter plus seven digits, NIF is
/// eight digits plus a letter. Control digit arithmetic is out of scope.
pub fn validate_nif(nif: &str) -> bool {
    let chars: Vec<char> = nif.chars().collect();
    if chars.len() != 9 {
        return false;
    }

    let first = chars[0];
    let middle = &chars[1..8];
    let last = chars[8];

    if first.is_ascii_alphabetic() {
        middle.iter().all(|c| c.is_ascii_digit())
    } else {
        chars[..8].iter().all(|c| c.is_ascii_digit()) && last.is_ascii_alphabetic()
    }
}

pub fn due_date(issue_date: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    issue_date + Duration::days(days)
}

pub struct DraftInvoice {
    pub series: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub emitter: EmitterData,
    pub receiver: ReceiverData,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: f64,
    pub total_vat: f64,
    pub total: f64,
    pub payment_method: String,
    pub notes: Option<String>,
    pub appointment_id: Option<String>,
}

/// Builds a draft invoice from a list of performed treatments. The number is
/// assigned later, when the draft is persisted.
pub fn invoice_from_treatments(
    emitter: EmitterData,
    receiver: ReceiverData,
    treatments: &[InvoiceLineInput],
    series: &str,
    payment_method: &str,
    notes: Option<String>,
    appointment_id: Option<String>,
) -> DraftInvoice {
    let lines: Vec<InvoiceLine> = treatments.iter().map(compute_line).collect();
    let totals = compute_totals(&lines);
    let issue_date = Utc::now();

    DraftInvoice {
        series: series.to_string(),
        issue_date,
        due_date: due_date(issue_date, 30),
        emitter,
        receiver,
        lines,
        subtotal: totals.subtotal,
        total_vat: totals.total_vat,
        total: totals.total,
        payment_method: payment_method.to_string(),
        notes,
        appointment_id,
    }
}
