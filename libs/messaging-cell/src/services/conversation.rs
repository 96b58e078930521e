use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    Conversation, ConversationListQuery, ConversationStatus, CreateConversationRequest,
    CreateMessageRequest, Message, MessagingError,
};

const CONVERSATIONS: &str = "conversations";
const MESSAGES: &str = "messages";

pub struct ConversationService {
    store: DocumentStore,
}

impl ConversationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn parse_id(conversation_id: &str) -> Result<Uuid, MessagingError> {
        Uuid::parse_str(conversation_id).map_err(|_| MessagingError::InvalidId)
    }

    pub async fn list_conversations(
        &self,
        query: ConversationListQuery,
    ) -> Result<Vec<Conversation>, MessagingError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);

        let filter = match query.status {
            Some(ref status) => json!({ "status": status }),
            None => json!({}),
        };

        let documents = self
            .store
            .find(
                CONVERSATIONS,
                filter,
                Some(json!({ "last_message_at": -1 })),
                Some(skip),
                Some(limit),
            )
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| MessagingError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, MessagingError> {
        let id = Self::parse_id(conversation_id)?;

        let document = self
            .store
            .find_one(CONVERSATIONS, json!({ "_id": id }))
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?
            .ok_or(MessagingError::ConversationNotFound)?;

        serde_json::from_value(document).map_err(|e| MessagingError::DatabaseError(e.to_string()))
    }

    pub async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> Result<Conversation, MessagingError> {
        debug!("Creating conversation for {}", request.whatsapp_number);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let document = json!({
            "_id": id,
            "patient_id": request.patient_id,
            "whatsapp_number": request.whatsapp_number,
            "status": request.status,
            "last_message_at": now,
            "created_at": now
        });

        self.store
            .insert_one(CONVERSATIONS, document)
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        self.get_conversation(&id.to_string()).await
    }

    pub async fn update_status(
        &self,
        conversation_id: &str,
        status: &str,
    ) -> Result<Conversation, MessagingError> {
        let id = Self::parse_id(conversation_id)?;

        let status = ConversationStatus::parse(status).ok_or_else(|| {
            MessagingError::ValidationError(
                "Status must be one of yellow, blue, green, gray".to_string(),
            )
        })?;

        let matched = self
            .store
            .update_one(
                CONVERSATIONS,
                json!({ "_id": id }),
                json!({ "$set": { "status": status } }),
            )
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        if matched == 0 {
            return Err(MessagingError::ConversationNotFound);
        }

        self.get_conversation(conversation_id).await
    }

    pub async fn get_messages(
        &self,
        conversation_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Message>, MessagingError> {
        self.get_conversation(conversation_id).await?;

        let documents = self
            .store
            .find(
                MESSAGES,
                json!({ "conversation_id": conversation_id }),
                Some(json!({ "sent_at": 1 })),
                Some(skip.max(0)),
                Some(limit.clamp(1, 1000)),
            )
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| MessagingError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn create_message(
        &self,
        conversation_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message, MessagingError> {
        let conversation = self.get_conversation(conversation_id).await?;

        if request.content.is_empty() {
            return Err(MessagingError::ValidationError(
                "Message content cannot be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let sent_at = request.sent_at.unwrap_or_else(Utc::now);
        let document = json!({
            "_id": id,
            "conversation_id": conversation_id,
            "type": request.message_type,
            "content": request.content,
            "sender": request.sender,
            "sent_at": sent_at
        });

        self.store
            .insert_one(MESSAGES, document)
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        self.touch_conversation(&conversation.id).await?;

        let created = self
            .store
            .find_one(MESSAGES, json!({ "_id": id }))
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?
            .ok_or(MessagingError::DatabaseError(
                "Message insert not visible".to_string(),
            ))?;

        serde_json::from_value(created).map_err(|e| MessagingError::DatabaseError(e.to_string()))
    }

    pub(crate) async fn touch_conversation(&self, id: &Uuid) -> Result<(), MessagingError> {
        self.store
            .update_one(
                CONVERSATIONS,
                json!({ "_id": id }),
                json!({ "$set": { "last_message_at": Utc::now() } }),
            )
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Finds the conversation for a WhatsApp number or opens a new
    /// unclassified one.
    pub async fn find_or_create_by_number(
        &self,
        whatsapp_number: &str,
    ) -> Result<Conversation, MessagingError> {
        let existing = self
            .store
            .find_one(CONVERSATIONS, json!({ "whatsapp_number": whatsapp_number }))
            .await
            .map_err(|e| MessagingError::DatabaseError(e.to_string()))?;

        if let Some(document) = existing {
            return serde_json::from_value(document)
                .map_err(|e| MessagingError::DatabaseError(e.to_string()));
        }

        self.create_conversation(CreateConversationRequest {
            patient_id: None,
            whatsapp_number: whatsapp_number.to_string(),
            status: ConversationStatus::Gray,
        })
        .await
    }
}
