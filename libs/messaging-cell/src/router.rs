use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use shared_config::AppConfig;

use crate::handlers::*;

pub fn create_conversation_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_conversations))
        .route("/", post(create_conversation))
        .route("/{id}", get(get_conversation))
        .route("/{id}/status", put(update_conversation_status))
        .route("/{id}/messages", get(get_conversation_messages))
        .route("/{id}/messages", post(create_message))
        .with_state(config)
}

pub fn create_whatsapp_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/status", get(get_whatsapp_status))
        .route("/qr", get(get_whatsapp_qr))
        .route("/send-message", post(send_whatsapp_message))
        .route("/webhook", post(whatsapp_webhook))
        .with_state(config)
}
