use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    CreateMessageRequest, MessageSender, MessageType, MessagingError, SendWhatsAppRequest,
    WebhookPayload,
};
use crate::services::ConversationService;

/// Proxy to the external WhatsApp bridge. The bridge owns the session and the
/// QR pairing flow; this service forwards requests and mirrors traffic into
/// the conversation store.
pub struct WhatsAppService {
    client: Client,
    base_url: String,
    conversations: ConversationService,
}

impl WhatsAppService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.whatsapp_service_url.clone(),
            conversations: ConversationService::new(config),
        }
    }

    pub async fn get_status(&self) -> Result<Value, MessagingError> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| MessagingError::ServiceUnavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| MessagingError::ServiceUnavailable(e.to_string()))
    }

    pub async fn get_qr_code(&self) -> Result<Value, MessagingError> {
        let url = format!("{}/qr", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| MessagingError::ServiceUnavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| MessagingError::ServiceUnavailable(e.to_string()))
    }

    pub async fn send_message(
        &self,
        request: SendWhatsAppRequest,
    ) -> Result<Value, MessagingError> {
        debug!("Sending WhatsApp message to {}", request.to);

        let url = format!("{}/send-message", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "to": request.to, "message": request.message }))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| MessagingError::ServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MessagingError::ServiceUnavailable(format!(
                "Bridge rejected message with status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MessagingError::ServiceUnavailable(e.to_string()))?;

        // Mirror the outbound message into the store when the caller links a
        // conversation. A bad id is not a send failure.
        if let Some(conversation_id) = request.conversation_id {
            if Uuid::parse_str(&conversation_id).is_ok() {
                let result = self
                    .conversations
                    .create_message(
                        &conversation_id,
                        CreateMessageRequest {
                            message_type: MessageType::Text,
                            content: request.message.clone(),
                            sender: MessageSender::Clinic,
                            sent_at: None,
                        },
                    )
                    .await;
                if let Err(e) = result {
                    warn!("Could not record outbound WhatsApp message: {}", e);
                }
            }
        }

        Ok(body)
    }

    pub async fn handle_webhook(&self, payload: WebhookPayload) -> Result<Value, MessagingError> {
        let phone = payload
            .from
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MessagingError::ValidationError("Missing sender number".to_string()))?;
        let message = payload
            .message
            .filter(|m| !m.is_empty())
            .ok_or_else(|| MessagingError::ValidationError("Missing message body".to_string()))?;

        let conversation = self.conversations.find_or_create_by_number(&phone).await?;

        self.conversations
            .create_message(
                &conversation.id.to_string(),
                CreateMessageRequest {
                    message_type: MessageType::Text,
                    content: message,
                    sender: MessageSender::Patient,
                    sent_at: None,
                },
            )
            .await?;

        Ok(json!({
            "success": true,
            "conversation_id": conversation.id
        }))
    }
}
