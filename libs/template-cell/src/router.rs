use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use shared_config::AppConfig;

use crate::handlers::*;

pub fn create_template_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/messages", get(list_message_templates))
        .route("/messages", post(create_message_template))
        .route("/messages/{id}", get(get_message_template))
        .route("/messages/{id}", put(update_message_template))
        .route("/messages/{id}", delete(delete_message_template))
        .route("/consents", get(list_consent_templates))
        .route("/consents", post(create_consent_template))
        .with_state(config)
}
