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
    CreateConsentTemplateRequest, CreateMessageTemplateRequest, TemplateListQuery,
    UpdateMessageTemplateRequest,
};
use crate::services::TemplateService;

#[axum::debug_handler]
pub async fn list_message_templates(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&config);
    let templates = service.list_message_templates(query).await?;
    Ok(Json(json!(templates)))
}

#[axum::debug_handler]
pub async fn get_message_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&config);
    let template = service.get_message_template(&template_id).await?;
    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn create_message_template(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreateMessageTemplateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = TemplateService::new(&config);
    let template = service.create_message_template(request).await?;
    Ok((StatusCode::CREATED, Json(json!(template))))
}

#[axum::debug_handler]
pub async fn update_message_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
    Json(request): Json<UpdateMessageTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&config);
    let template = service.update_message_template(&template_id, request).await?;
    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn delete_message_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = TemplateService::new(&config);
    service.delete_message_template(&template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_consent_templates(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&config);
    let templates = service.list_consent_templates(query).await?;
    Ok(Json(json!(templates)))
}

#[axum::debug_handler]
pub async fn create_consent_template(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreateConsentTemplateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = TemplateService::new(&config);
    let template = service.create_consent_template(request).await?;
    Ok((StatusCode::CREATED, Json(json!(template))))
}
