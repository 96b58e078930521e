use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Triage colour for the inbox. Yellow is urgent, blue is normal, green is
/// resolved and gray is unclassified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Yellow,
    Blue,
    Green,
    Gray,
}

impl ConversationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yellow" => Some(Self::Yellow),
            "blue" => Some(Self::Blue),
            "green" => Some(Self::Green),
            "gray" => Some(Self::Gray),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Button,
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    Patient,
    Clinic,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub patient_id: Option<String>,
    pub whatsapp_number: String,
    pub status: ConversationStatus,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub conversation_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub sender: MessageSender,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    pub patient_id: Option<String>,
    pub whatsapp_number: String,
    #[serde(default = "default_status")]
    pub status: ConversationStatus,
}

fn default_status() -> ConversationStatus {
    ConversationStatus::Gray
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: MessageType,
    pub content: String,
    pub sender: MessageSender,
    pub sent_at: Option<DateTime<Utc>>,
}

fn default_message_type() -> MessageType {
    MessageType::Text
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendWhatsAppRequest {
    pub to: String,
    pub message: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub from: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Invalid conversation id")]
    InvalidId,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("WhatsApp service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::ConversationNotFound => AppError::NotFound(err.to_string()),
            MessagingError::InvalidId => AppError::BadRequest(err.to_string()),
            MessagingError::ValidationError(msg) => AppError::ValidationError(msg),
            MessagingError::ServiceUnavailable(msg) => AppError::ExternalService(msg),
            MessagingError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(
            ConversationStatus::parse("yellow"),
            Some(ConversationStatus::Yellow)
        );
        assert_eq!(ConversationStatus::parse("purple"), None);
    }

    #[test]
    fn message_type_round_trips_with_rename() {
        let msg: CreateMessageRequest = serde_json::from_value(serde_json::json!({
            "type": "button",
            "content": "Confirmar cita",
            "sender": "clinic"
        }))
        .unwrap();
        assert_eq!(msg.message_type, MessageType::Button);
        assert_eq!(msg.sender, MessageSender::Clinic);
    }
}
