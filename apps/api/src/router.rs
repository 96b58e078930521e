use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::json;

use analytics_cell::router::create_analytics_router;
use appointment_cell::router::create_appointment_router;
use communication_cell::router::create_communication_router;
use invoice_cell::router::create_invoice_router;
use messaging_cell::router::{create_conversation_router, create_whatsapp_router};
use patient_cell::router::create_patient_router;
use shared_config::AppConfig;
use template_cell::router::create_template_router;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dentaria clinic API is running!" }))
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "ok", "service": "dentaria-api" })) }),
        )
        .nest("/api/patients", create_patient_router(state.clone()))
        .nest("/api/appointments", create_appointment_router(state.clone()))
        .nest("/api/conversations", create_conversation_router(state.clone()))
        .nest("/api/whatsapp", create_whatsapp_router(state.clone()))
        .nest("/api/templates", create_template_router(state.clone()))
        .nest("/api/facturas", create_invoice_router(state.clone()))
        .nest("/api/analytics", create_analytics_router(state.clone()))
        .nest("/api/communication", create_communication_router(state))
}
