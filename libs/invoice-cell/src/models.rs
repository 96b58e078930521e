use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Spanish VAT brackets. `Exempt` is distinct from `Zero` on the printed
/// invoice even though both carry no tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VatRate {
    #[serde(rename = "21")]
    Standard,
    #[serde(rename = "10")]
    Reduced,
    #[serde(rename = "4")]
    SuperReduced,
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "exempt")]
    Exempt,
}

impl Default for VatRate {
    fn default() -> Self {
        Self::Standard
    }
}

impl VatRate {
    pub fn rate(&self) -> f64 {
        match self {
            VatRate::Standard => 0.21,
            VatRate::Reduced => 0.10,
            VatRate::SuperReduced => 0.04,
            VatRate::Zero | VatRate::Exempt => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Void,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterData {
    pub nif: String,
    pub legal_name: String,
    pub address: String,
    pub municipality: String,
    pub postal_code: String,
    pub province: String,
    pub commercial_registry: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverData {
    pub nif: Option<String>,
    pub full_name: String,
    pub address: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// One billed concept with its computed amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub concept: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_pct: f64,
    #[serde(default)]
    pub vat_rate: VatRate,
    pub taxable_base: f64,
    pub vat_amount: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub number: String,
    pub series: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub emitter: EmitterData,
    pub receiver: ReceiverData,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: f64,
    pub total_vat: f64,
    pub total: f64,
    pub invoice_type: String,
    pub status: InvoiceStatus,
    pub tax_submitted_at: Option<DateTime<Utc>>,
    pub tax_response: Option<String>,
    pub qr_data: Option<String>,
    pub verification_hash: Option<String>,
    pub appointment_id: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineInput {
    pub concept: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub discount_pct: f64,
    #[serde(default)]
    pub vat_rate: VatRate,
}

fn default_quantity() -> f64 {
    1.0
}

fn default_series() -> String {
    "A".to_string()
}

fn default_invoice_type() -> String {
    "F1".to_string()
}

fn default_payment_method() -> String {
    "transferencia".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    /// Assigned from the series sequence when empty.
    #[serde(default)]
    pub number: String,
    #[serde(default = "default_series")]
    pub series: String,
    pub emitter: EmitterData,
    pub receiver: ReceiverData,
    pub lines: Vec<InvoiceLineInput>,
    #[serde(default = "default_invoice_type")]
    pub invoice_type: String,
    pub appointment_id: Option<String>,
    pub notes: Option<String>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub series: Option<String>,
    pub receiver: Option<ReceiverData>,
    pub lines: Option<Vec<InvoiceLineInput>>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub series: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayQuery {
    pub payment_method: Option<String>,
}

/// Treatments performed during an appointment, used to build an invoice
/// without retyping the lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub appointment_id: String,
    pub treatments: Vec<InvoiceLineInput>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialDashboard {
    pub revenue_current_month: f64,
    pub revenue_previous_month: f64,
    pub revenue_current_year: f64,
    pub total_invoices: i64,
    pub pending_invoices: i64,
    pub paid_invoices: i64,
    pub void_invoices: i64,
    pub outstanding_amount: f64,
    pub collected_this_month: f64,
    pub top_treatment: Option<String>,
    pub mean_invoice_value: f64,
    pub revenue_by_month: Vec<serde_json::Value>,
    pub revenue_by_treatment: Vec<serde_json::Value>,
    pub invoices_by_status: Vec<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("Invoice not found")]
    NotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Invalid invoice id")]
    InvalidId,

    #[error("Issued or paid invoices cannot be edited")]
    Locked,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::NotFound
            | InvoiceError::AppointmentNotFound
            | InvoiceError::PatientNotFound => AppError::NotFound(err.to_string()),
            InvoiceError::InvalidId | InvoiceError::Locked => AppError::BadRequest(err.to_string()),
            InvoiceError::ValidationError(msg) => AppError::ValidationError(msg),
            InvoiceError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
