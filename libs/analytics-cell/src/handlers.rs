use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{PeriodQuery, RankingQuery};
use crate::services::AnalyticsService;

#[axum::debug_handler]
pub async fn get_overview(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let overview = service.overview(query.date_from, query.date_to).await?;
    Ok(Json(overview))
}

#[axum::debug_handler]
pub async fn get_patient_analytics(
    State(config): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    info!("Computing analytics for patient {}", patient_id);
    let service = AnalyticsService::new(&config);
    let analytics = service.patient_analytics(&patient_id).await?;
    Ok(Json(analytics))
}

#[axum::debug_handler]
pub async fn get_ltv_ranking(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let ranking = service.ltv_ranking(query.limit.unwrap_or(20)).await?;
    Ok(Json(ranking))
}

#[axum::debug_handler]
pub async fn get_conversion_funnel(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let funnel = service
        .conversion_funnel(query.date_from, query.date_to)
        .await?;
    Ok(Json(funnel))
}

#[axum::debug_handler]
pub async fn get_treatment_roi(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let roi = service.treatment_roi(query.date_from, query.date_to).await?;
    Ok(Json(roi))
}

#[axum::debug_handler]
pub async fn get_doctor_performance(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let performance = service
        .doctor_performance(query.date_from, query.date_to)
        .await?;
    Ok(Json(performance))
}

#[axum::debug_handler]
pub async fn get_trends(State(config): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let trends = service.trends().await?;
    Ok(Json(trends))
}

#[axum::debug_handler]
pub async fn get_realtime_metrics(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = AnalyticsService::new(&config);
    let metrics = service.realtime().await?;
    Ok(Json(metrics))
}
