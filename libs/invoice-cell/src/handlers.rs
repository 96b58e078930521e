use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    CreateInvoiceRequest, GenerateInvoiceRequest, InvoiceListQuery, PayQuery,
    UpdateInvoiceRequest,
};
use crate::services::InvoiceService;

#[axum::debug_handler]
pub async fn create_invoice(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = InvoiceService::new(&config);
    let invoice = service.create_invoice(request).await?;
    Ok((StatusCode::CREATED, Json(json!(invoice))))
}

#[axum::debug_handler]
pub async fn list_invoices(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let invoices = service.list_invoices(query).await?;
    Ok(Json(json!(invoices)))
}

#[axum::debug_handler]
pub async fn get_financial_dashboard(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let dashboard = service.financial_dashboard().await?;
    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn generate_invoice(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = InvoiceService::new(&config);
    let invoice = service.generate_from_appointment(request).await?;
    Ok((StatusCode::CREATED, Json(json!(invoice))))
}

#[axum::debug_handler]
pub async fn get_invoice(
    State(config): State<Arc<AppConfig>>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let invoice = service.get_invoice(&invoice_id).await?;
    Ok(Json(json!(invoice)))
}

#[axum::debug_handler]
pub async fn update_invoice(
    State(config): State<Arc<AppConfig>>,
    Path(invoice_id): Path<String>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let invoice = service.update_invoice(&invoice_id, request).await?;
    Ok(Json(json!(invoice)))
}

#[axum::debug_handler]
pub async fn void_invoice(
    State(config): State<Arc<AppConfig>>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let result = service.void_invoice(&invoice_id).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn get_invoice_qr(
    State(config): State<Arc<AppConfig>>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let qr = service.get_qr(&invoice_id).await?;
    Ok(Json(qr))
}

#[axum::debug_handler]
pub async fn submit_invoice(
    State(config): State<Arc<AppConfig>>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let result = service.submit_invoice(&invoice_id).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn pay_invoice(
    State(config): State<Arc<AppConfig>>,
    Path(invoice_id): Path<String>,
    Query(query): Query<PayQuery>,
) -> Result<Json<Value>, AppError> {
    let service = InvoiceService::new(&config);
    let method = query
        .payment_method
        .unwrap_or_else(|| "transferencia".to_string());
    let result = service.pay_invoice(&invoice_id, &method).await?;
    Ok(Json(result))
}
