use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use shared_config::AppConfig;

use crate::handlers::*;

pub fn create_invoice_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/", post(create_invoice))
        .route("/dashboard", get(get_financial_dashboard))
        .route("/generate", post(generate_invoice))
        .route("/{id}", get(get_invoice))
        .route("/{id}", put(update_invoice))
        .route("/{id}", delete(void_invoice))
        .route("/{id}/qr", get(get_invoice_qr))
        .route("/{id}/submit", post(submit_invoice))
        .route("/{id}/pay", post(pay_invoice))
        .with_state(config)
}
