use std::collections::HashMap;

use chrono::Datelike;
use serde_json::{json, Value};

use crate::models::{Invoice, InvoiceStatus};
use crate::services::billing::round2;

/// Revenue counts as earned once the invoice is issued; drafts and voided
/// invoices never contribute.
fn earns_revenue(status: InvoiceStatus) -> bool {
    matches!(status, InvoiceStatus::Issued | InvoiceStatus::Paid)
}

pub struct MonthlyMetrics {
    pub revenue_total: f64,
    pub revenue_collected: f64,
    pub invoice_count: usize,
    pub paid_count: usize,
}

pub fn monthly_metrics(invoices: &[Invoice], month: u32, year: i32) -> MonthlyMetrics {
    let in_month: Vec<&Invoice> = invoices
        .iter()
        .filter(|f| f.issue_date.month() == month && f.issue_date.year() == year)
        .collect();

    let revenue_total = in_month
        .iter()
        .filter(|f| earns_revenue(f.status))
        .map(|f| f.total)
        .sum();

    let paid: Vec<&&Invoice> = in_month
        .iter()
        .filter(|f| f.status == InvoiceStatus::Paid)
        .collect();
    let revenue_collected = paid.iter().map(|f| f.total).sum();

    MonthlyMetrics {
        revenue_total: round2(revenue_total),
        revenue_collected: round2(revenue_collected),
        invoice_count: in_month.len(),
        paid_count: paid.len(),
    }
}

/// Revenue per treatment concept, highest first.
pub fn revenue_by_treatment(invoices: &[Invoice]) -> Vec<Value> {
    let mut by_concept: HashMap<String, f64> = HashMap::new();

    for invoice in invoices {
        if !earns_revenue(invoice.status) {
            continue;
        }
        for line in &invoice.lines {
            *by_concept.entry(line.concept.clone()).or_insert(0.0) += line.line_total;
        }
    }

    let mut entries: Vec<(String, f64)> = by_concept.into_iter().collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    entries
        .into_iter()
        .map(|(treatment, revenue)| {
            json!({ "treatment": treatment, "revenue": round2(revenue) })
        })
        .collect()
}

pub fn status_distribution(invoices: &[Invoice]) -> Vec<Value> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    for invoice in invoices {
        let status = match invoice.status {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Void => "void",
            InvoiceStatus::Paid => "paid",
        };
        *counts.entry(status.to_string()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmitterData, InvoiceLine, ReceiverData, VatRate};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn invoice(status: InvoiceStatus, total: f64, month: u32, concept: &str) -> Invoice {
        let issue_date = Utc.with_ymd_and_hms(2026, month, 10, 12, 0, 0).unwrap();
        Invoice {
            id: Uuid::new_v4(),
            number: "F2026-A0001".to_string(),
            series: "A".to_string(),
            issue_date,
            due_date: issue_date,
            emitter: EmitterData {
                nif: "B12345678".to_string(),
                legal_name: "Clínica Dentaria SL".to_string(),
                address: "Calle Mayor 123".to_string(),
                municipality: "Madrid".to_string(),
                postal_code: "28001".to_string(),
                province: "Madrid".to_string(),
                commercial_registry: None,
                email: "facturacion@dentaria.example".to_string(),
            },
            receiver: ReceiverData {
                nif: None,
                full_name: "María García".to_string(),
                address: None,
                email: "maria@example.com".to_string(),
                phone: None,
            },
            lines: vec![InvoiceLine {
                concept: concept.to_string(),
                quantity: 1.0,
                unit_price: total,
                discount_pct: 0.0,
                vat_rate: VatRate::Zero,
                taxable_base: total,
                vat_amount: 0.0,
                line_total: total,
            }],
            subtotal: total,
            total_vat: 0.0,
            total,
            invoice_type: "F1".to_string(),
            status,
            tax_submitted_at: None,
            tax_response: None,
            qr_data: None,
            verification_hash: None,
            appointment_id: None,
            notes: None,
            payment_method: None,
            created_at: issue_date,
            updated_at: issue_date,
        }
    }

    #[test]
    fn drafts_and_voids_earn_nothing() {
        let invoices = vec![
            invoice(InvoiceStatus::Issued, 100.0, 3, "Limpieza"),
            invoice(InvoiceStatus::Paid, 50.0, 3, "Limpieza"),
            invoice(InvoiceStatus::Draft, 999.0, 3, "Limpieza"),
            invoice(InvoiceStatus::Void, 999.0, 3, "Limpieza"),
        ];

        let metrics = monthly_metrics(&invoices, 3, 2026);
        assert_eq!(metrics.revenue_total, 150.0);
        assert_eq!(metrics.revenue_collected, 50.0);
        assert_eq!(metrics.invoice_count, 4);
        assert_eq!(metrics.paid_count, 1);
    }

    #[test]
    fn treatment_revenue_sorts_descending() {
        let invoices = vec![
            invoice(InvoiceStatus::Paid, 40.0, 3, "Limpieza"),
            invoice(InvoiceStatus::Issued, 300.0, 4, "Implante"),
            invoice(InvoiceStatus::Paid, 60.0, 5, "Limpieza"),
        ];

        let result = revenue_by_treatment(&invoices);
        assert_eq!(result[0]["treatment"], "Implante");
        assert_eq!(result[0]["revenue"], 300.0);
        assert_eq!(result[1]["treatment"], "Limpieza");
        assert_eq!(result[1]["revenue"], 100.0);
    }

    #[test]
    fn counts_every_status() {
        let invoices = vec![
            invoice(InvoiceStatus::Draft, 1.0, 1, "A"),
            invoice(InvoiceStatus::Draft, 1.0, 2, "A"),
            invoice(InvoiceStatus::Paid, 1.0, 3, "A"),
        ];

        let mut result = status_distribution(&invoices);
        result.sort_by_key(|v| v["status"].as_str().unwrap_or("").to_string());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["status"], "draft");
        assert_eq!(result[0]["count"], 2);
    }
}
