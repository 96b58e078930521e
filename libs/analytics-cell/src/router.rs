use axum::{routing::get, Router};
use std::sync::Arc;

use shared_config::AppConfig;

use crate::handlers::{
    get_conversion_funnel, get_doctor_performance, get_ltv_ranking, get_overview,
    get_patient_analytics, get_realtime_metrics, get_treatment_roi, get_trends,
};

pub fn create_analytics_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/overview", get(get_overview))
        .route("/patients/ltv-ranking", get(get_ltv_ranking))
        .route("/patients/{id}", get(get_patient_analytics))
        .route("/funnel", get(get_conversion_funnel))
        .route("/roi/treatments", get(get_treatment_roi))
        .route("/roi/doctors", get(get_doctor_performance))
        .route("/trends", get(get_trends))
        .route("/realtime", get(get_realtime_metrics))
        .with_state(config)
}
