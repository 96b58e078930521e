use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    ConversationListQuery, CreateConversationRequest, CreateMessageRequest, SendWhatsAppRequest,
    StatusQuery, WebhookPayload,
};
use crate::services::{ConversationService, WhatsAppService};

#[derive(Debug, Deserialize)]
pub struct MessagePageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[axum::debug_handler]
pub async fn list_conversations(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ConversationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ConversationService::new(&config);
    let conversations = service.list_conversations(query).await?;
    Ok(Json(json!(conversations)))
}

#[axum::debug_handler]
pub async fn get_conversation(
    State(config): State<Arc<AppConfig>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ConversationService::new(&config);
    let conversation = service.get_conversation(&conversation_id).await?;
    Ok(Json(json!(conversation)))
}

#[axum::debug_handler]
pub async fn create_conversation(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ConversationService::new(&config);
    let conversation = service.create_conversation(request).await?;
    Ok((StatusCode::CREATED, Json(json!(conversation))))
}

#[axum::debug_handler]
pub async fn update_conversation_status(
    State(config): State<Arc<AppConfig>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ConversationService::new(&config);
    let conversation = service.update_status(&conversation_id, &query.status).await?;
    Ok(Json(json!(conversation)))
}

#[axum::debug_handler]
pub async fn get_conversation_messages(
    State(config): State<Arc<AppConfig>>,
    Path(conversation_id): Path<String>,
    Query(page): Query<MessagePageQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ConversationService::new(&config);
    let messages = service
        .get_messages(
            &conversation_id,
            page.skip.unwrap_or(0),
            page.limit.unwrap_or(100),
        )
        .await?;
    Ok(Json(json!(messages)))
}

#[axum::debug_handler]
pub async fn create_message(
    State(config): State<Arc<AppConfig>>,
    Path(conversation_id): Path<String>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ConversationService::new(&config);
    let message = service.create_message(&conversation_id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(message))))
}

#[axum::debug_handler]
pub async fn get_whatsapp_status(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = WhatsAppService::new(&config);
    let status = service.get_status().await?;
    Ok(Json(status))
}

#[axum::debug_handler]
pub async fn get_whatsapp_qr(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = WhatsAppService::new(&config);
    let qr = service.get_qr_code().await?;
    Ok(Json(qr))
}

#[axum::debug_handler]
pub async fn send_whatsapp_message(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SendWhatsAppRequest>,
) -> Result<Json<Value>, AppError> {
    let service = WhatsAppService::new(&config);
    let result = service.send_message(request).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn whatsapp_webhook(
    State(config): State<Arc<AppConfig>>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<Value>, AppError> {
    let service = WhatsAppService::new(&config);
    let result = service.handle_webhook(payload).await?;
    Ok(Json(result))
}
