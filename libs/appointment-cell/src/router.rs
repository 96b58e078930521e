use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use shared_config::AppConfig;

use crate::handlers::*;

pub fn create_appointment_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_appointments))
        .route("/", post(create_appointment))
        .route("/stats", get(get_appointment_stats))
        .route("/{id}", get(get_appointment))
        .route("/{id}", put(update_appointment))
        .route("/{id}", delete(delete_appointment))
        .with_state(config)
}
