use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use shared_config::AppConfig;

use crate::handlers::*;

pub fn create_patient_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_patients))
        .route("/", post(create_patient))
        .route("/{id}", get(get_patient))
        .route("/{id}", put(update_patient))
        .route("/{id}", delete(delete_patient))
        .route("/{id}/history", get(get_patient_history))
        .with_state(config)
}
