use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    CreateInvoiceRequest, EmitterData, FinancialDashboard, GenerateInvoiceRequest, Invoice,
    InvoiceError, InvoiceLine, InvoiceListQuery, InvoiceStatus, ReceiverData, UpdateInvoiceRequest,
};
use crate::services::billing;
use crate::services::dashboard;

const COLLECTION: &str = "facturas";

/// Emitter used when generating invoices straight from an appointment.
fn default_emitter() -> EmitterData {
    EmitterData {
        nif: "B12345678".to_string(),
        legal_name: "Clínica Dentaria SL".to_string(),
        address: "Calle Mayor 123".to_string(),
        municipality: "Madrid".to_string(),
        postal_code: "28001".to_string(),
        province: "Madrid".to_string(),
        commercial_registry: None,
        email: "facturacion@dentaria.example".to_string(),
    }
}

pub struct InvoiceService {
    store: DocumentStore,
    verification_base_url: String,
}

impl InvoiceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
            verification_base_url: config.verification_base_url.clone(),
        }
    }

    fn parse_id(invoice_id: &str) -> Result<Uuid, InvoiceError> {
        Uuid::parse_str(invoice_id).map_err(|_| InvoiceError::InvalidId)
    }

    fn db_err(e: anyhow::Error) -> InvoiceError {
        InvoiceError::DatabaseError(e.to_string())
    }

    /// Highest sequence already used in the series for the given year. The
    /// sequences are compared numerically, a lexicographic sort on the number
    /// string would misorder once a series passes 9999.
    async fn last_sequence(&self, series: &str, year: i32) -> Result<u32, InvoiceError> {
        let candidates = self
            .store
            .find(
                COLLECTION,
                json!({
                    "series": series,
                    "number": { "$regex": format!("^F{}", year) }
                }),
                None,
                None,
                None,
            )
            .await
            .map_err(Self::db_err)?;

        Ok(candidates
            .iter()
            .filter_map(|doc| doc.get("number").and_then(|n| n.as_str()))
            .map(billing::parse_sequence)
            .max()
            .unwrap_or(0))
    }

    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
    ) -> Result<Invoice, InvoiceError> {
        if request.lines.is_empty() {
            return Err(InvoiceError::ValidationError(
                "Invoice must have at least one line".to_string(),
            ));
        }
        if !billing::validate_nif(&request.emitter.nif) {
            return Err(InvoiceError::ValidationError(
                "Emitter NIF/CIF is not valid".to_string(),
            ));
        }
        if let Some(ref nif) = request.receiver.nif {
            if !billing::validate_nif(nif) {
                return Err(InvoiceError::ValidationError(
                    "Receiver NIF is not valid".to_string(),
                ));
            }
        }

        let lines: Vec<InvoiceLine> = request.lines.iter().map(billing::compute_line).collect();
        let totals = billing::compute_totals(&lines);

        let issue_date = Utc::now();
        let year = issue_date.year();

        let number = if request.number.is_empty() {
            let last = self.last_sequence(&request.series, year).await?;
            billing::next_invoice_number(&request.series, year, last)
        } else {
            request.number.clone()
        };

        let hash = billing::verification_hash(
            &number,
            &issue_date,
            &request.emitter.nif,
            &request.receiver.full_name,
            totals.total,
        );
        let qr_data = billing::qr_payload(
            &request.emitter.nif,
            &issue_date,
            &number,
            totals.total,
            totals.total_vat,
            &hash,
            &self.verification_base_url,
        );

        info!("Creating invoice {}", number);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let document = json!({
            "_id": id,
            "number": number,
            "series": request.series,
            "issue_date": issue_date,
            "due_date": billing::due_date(issue_date, 30),
            "emitter": request.emitter,
            "receiver": request.receiver,
            "lines": lines,
            "subtotal": totals.subtotal,
            "total_vat": totals.total_vat,
            "total": totals.total,
            "invoice_type": request.invoice_type,
            "status": InvoiceStatus::Draft,
            "tax_submitted_at": Value::Null,
            "tax_response": Value::Null,
            "qr_data": qr_data,
            "verification_hash": hash,
            "appointment_id": request.appointment_id,
            "notes": request.notes,
            "payment_method": request.payment_method,
            "created_at": now,
            "updated_at": now
        });

        self.store
            .insert_one(COLLECTION, document)
            .await
            .map_err(Self::db_err)?;

        self.get_invoice(&id.to_string()).await
    }

    pub async fn list_invoices(
        &self,
        query: InvoiceListQuery,
    ) -> Result<Vec<Invoice>, InvoiceError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 500);

        let mut filter = serde_json::Map::new();
        if let Some(status) = query.status {
            filter.insert("status".to_string(), json!(status));
        }
        if let Some(series) = query.series {
            filter.insert("series".to_string(), json!(series));
        }
        if query.date_from.is_some() || query.date_to.is_some() {
            let mut range = serde_json::Map::new();
            if let Some(from) = query.date_from {
                range.insert("$gte".to_string(), json!(from));
            }
            if let Some(to) = query.date_to {
                range.insert("$lte".to_string(), json!(to));
            }
            filter.insert("issue_date".to_string(), Value::Object(range));
        }

        let documents = self
            .store
            .find(
                COLLECTION,
                Value::Object(filter),
                Some(json!({ "issue_date": -1 })),
                Some(skip),
                Some(limit),
            )
            .await
            .map_err(Self::db_err)?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| InvoiceError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, InvoiceError> {
        let id = Self::parse_id(invoice_id)?;

        let document = self
            .store
            .find_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(InvoiceError::NotFound)?;

        serde_json::from_value(document).map_err(|e| InvoiceError::DatabaseError(e.to_string()))
    }

    /// Drafts stay editable; issued and paid invoices are immutable and can
    /// only be voided through a corrective invoice.
    pub async fn update_invoice(
        &self,
        invoice_id: &str,
        request: UpdateInvoiceRequest,
    ) -> Result<Invoice, InvoiceError> {
        let existing = self.get_invoice(invoice_id).await?;

        if matches!(existing.status, InvoiceStatus::Issued | InvoiceStatus::Paid) {
            return Err(InvoiceError::Locked);
        }

        let mut update_data = serde_json::Map::new();
        if let Some(series) = request.series {
            update_data.insert("series".to_string(), json!(series));
        }
        if let Some(receiver) = request.receiver {
            update_data.insert("receiver".to_string(), json!(receiver));
        }
        if let Some(inputs) = request.lines {
            if inputs.is_empty() {
                return Err(InvoiceError::ValidationError(
                    "Invoice must have at least one line".to_string(),
                ));
            }
            let lines: Vec<InvoiceLine> = inputs.iter().map(billing::compute_line).collect();
            let totals = billing::compute_totals(&lines);
            update_data.insert("lines".to_string(), json!(lines));
            update_data.insert("subtotal".to_string(), json!(totals.subtotal));
            update_data.insert("total_vat".to_string(), json!(totals.total_vat));
            update_data.insert("total".to_string(), json!(totals.total));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(payment_method) = request.payment_method {
            update_data.insert("payment_method".to_string(), json!(payment_method));
        }

        if update_data.is_empty() {
            return Err(InvoiceError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": existing.id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(Self::db_err)?;

        self.get_invoice(invoice_id).await
    }

    /// Invoices are never deleted, only marked void.
    pub async fn void_invoice(&self, invoice_id: &str) -> Result<Value, InvoiceError> {
        let existing = self.get_invoice(invoice_id).await?;

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": existing.id }),
                json!({ "$set": { "status": InvoiceStatus::Void, "updated_at": Utc::now() } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "message": "Invoice voided",
            "invoice_id": invoice_id
        }))
    }

    pub async fn get_qr(&self, invoice_id: &str) -> Result<Value, InvoiceError> {
        let invoice = self.get_invoice(invoice_id).await?;

        Ok(json!({
            "invoice_id": invoice_id,
            "number": invoice.number,
            "qr_data": invoice.qr_data,
            "verification_hash": invoice.verification_hash
        }))
    }

    /// Marks the invoice as issued. The tax agency integration is simulated,
    /// the acceptance is recorded as if the submission succeeded.
    pub async fn submit_invoice(&self, invoice_id: &str) -> Result<Value, InvoiceError> {
        let existing = self.get_invoice(invoice_id).await?;

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": existing.id }),
                json!({ "$set": {
                    "status": InvoiceStatus::Issued,
                    "tax_submitted_at": Utc::now(),
                    "tax_response": "Aceptada (simulado)",
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "message": "Invoice submitted",
            "invoice_id": invoice_id,
            "status": "issued"
        }))
    }

    pub async fn pay_invoice(
        &self,
        invoice_id: &str,
        payment_method: &str,
    ) -> Result<Value, InvoiceError> {
        let existing = self.get_invoice(invoice_id).await?;

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": existing.id }),
                json!({ "$set": {
                    "status": InvoiceStatus::Paid,
                    "payment_method": payment_method,
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "message": "Payment recorded",
            "invoice_id": invoice_id,
            "payment_method": payment_method,
            "status": "paid"
        }))
    }

    /// Builds and persists a draft invoice from an appointment's treatments,
    /// pulling receiver data from the patient record.
    pub async fn generate_from_appointment(
        &self,
        request: GenerateInvoiceRequest,
    ) -> Result<Invoice, InvoiceError> {
        let appointment_id =
            Uuid::parse_str(&request.appointment_id).map_err(|_| InvoiceError::InvalidId)?;

        let appointment = self
            .store
            .find_one("appointments", json!({ "_id": appointment_id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(InvoiceError::AppointmentNotFound)?;

        let patient_id = appointment
            .get("patient_id")
            .and_then(|p| p.as_str())
            .and_then(|p| Uuid::parse_str(p).ok())
            .ok_or(InvoiceError::PatientNotFound)?;

        let patient = self
            .store
            .find_one("patients", json!({ "_id": patient_id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(InvoiceError::PatientNotFound)?;

        let receiver = ReceiverData {
            nif: None,
            full_name: patient
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or_default()
                .to_string(),
            address: None,
            email: patient
                .get("email")
                .and_then(|e| e.as_str())
                .unwrap_or("sin-email@example.com")
                .to_string(),
            phone: patient
                .get("phone")
                .and_then(|p| p.as_str())
                .map(|p| p.to_string()),
        };

        debug!("Generating invoice for appointment {}", request.appointment_id);

        self.create_invoice(CreateInvoiceRequest {
            number: String::new(),
            series: "A".to_string(),
            emitter: default_emitter(),
            receiver,
            lines: request.treatments,
            invoice_type: "F1".to_string(),
            appointment_id: Some(request.appointment_id),
            notes: request.notes,
            payment_method: request.payment_method,
        })
        .await
    }

    pub async fn financial_dashboard(&self) -> Result<FinancialDashboard, InvoiceError> {
        let documents = self
            .store
            .find(COLLECTION, json!({}), None, None, None)
            .await
            .map_err(Self::db_err)?;

        let invoices: Vec<Invoice> = documents
            .into_iter()
            .filter_map(|doc| serde_json::from_value(doc).ok())
            .collect();

        let now = Utc::now();
        let current_month = now.month();
        let current_year = now.year();
        let (previous_month, previous_year) = if current_month == 1 {
            (12, current_year - 1)
        } else {
            (current_month - 1, current_year)
        };

        let this_month = dashboard::monthly_metrics(&invoices, current_month, current_year);
        let last_month = dashboard::monthly_metrics(&invoices, previous_month, previous_year);

        let revenue_current_year: f64 = invoices
            .iter()
            .filter(|f| f.issue_date.year() == current_year)
            .filter(|f| matches!(f.status, InvoiceStatus::Issued | InvoiceStatus::Paid))
            .map(|f| f.total)
            .sum();

        let pending: Vec<&Invoice> = invoices
            .iter()
            .filter(|f| f.status == InvoiceStatus::Issued)
            .collect();
        let outstanding_amount: f64 = pending.iter().map(|f| f.total).sum();
        let paid_count = invoices
            .iter()
            .filter(|f| f.status == InvoiceStatus::Paid)
            .count();
        let void_count = invoices
            .iter()
            .filter(|f| f.status == InvoiceStatus::Void)
            .count();

        let billable: Vec<&Invoice> = invoices
            .iter()
            .filter(|f| matches!(f.status, InvoiceStatus::Issued | InvoiceStatus::Paid))
            .collect();
        let mean_invoice_value = if billable.is_empty() {
            0.0
        } else {
            billable.iter().map(|f| f.total).sum::<f64>() / billable.len() as f64
        };

        let by_treatment = dashboard::revenue_by_treatment(&invoices);
        let top_treatment = by_treatment
            .first()
            .and_then(|entry| entry.get("treatment"))
            .and_then(|t| t.as_str())
            .map(|t| t.to_string());

        let mut revenue_by_month = Vec::with_capacity(12);
        for i in 0..12 {
            let mut month = current_month as i32 - i;
            let mut year = current_year;
            if month <= 0 {
                month += 12;
                year -= 1;
            }
            let metrics = dashboard::monthly_metrics(&invoices, month as u32, year);
            revenue_by_month.insert(
                0,
                json!({
                    "month": format!("{}-{:02}", year, month),
                    "revenue": metrics.revenue_total
                }),
            );
        }

        Ok(FinancialDashboard {
            revenue_current_month: this_month.revenue_total,
            revenue_previous_month: last_month.revenue_total,
            revenue_current_year: billing::round2(revenue_current_year),
            total_invoices: invoices.len() as i64,
            pending_invoices: pending.len() as i64,
            paid_invoices: paid_count as i64,
            void_invoices: void_count as i64,
            outstanding_amount: billing::round2(outstanding_amount),
            collected_this_month: this_month.revenue_collected,
            top_treatment,
            mean_invoice_value: billing::round2(mean_invoice_value),
            revenue_by_month,
            revenue_by_treatment: by_treatment.into_iter().take(10).collect(),
            invoices_by_status: dashboard::status_distribution(&invoices),
        })
    }
}
