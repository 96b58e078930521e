use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    validate_name_and_content, ConsentTemplate, CreateConsentTemplateRequest,
    CreateMessageTemplateRequest, MessageTemplate, TemplateError, TemplateListQuery,
    UpdateMessageTemplateRequest,
};

const MESSAGE_TEMPLATES: &str = "message_templates";
const CONSENT_TEMPLATES: &str = "consent_templates";

pub struct TemplateService {
    store: DocumentStore,
}

impl TemplateService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn parse_id(template_id: &str) -> Result<Uuid, TemplateError> {
        Uuid::parse_str(template_id).map_err(|_| TemplateError::InvalidId)
    }

    pub async fn list_message_templates(
        &self,
        query: TemplateListQuery,
    ) -> Result<Vec<MessageTemplate>, TemplateError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);

        let documents = self
            .store
            .find(MESSAGE_TEMPLATES, json!({}), None, Some(skip), Some(limit))
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| TemplateError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn get_message_template(
        &self,
        template_id: &str,
    ) -> Result<MessageTemplate, TemplateError> {
        let id = Self::parse_id(template_id)?;

        let document = self
            .store
            .find_one(MESSAGE_TEMPLATES, json!({ "_id": id }))
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?
            .ok_or(TemplateError::NotFound)?;

        serde_json::from_value(document).map_err(|e| TemplateError::DatabaseError(e.to_string()))
    }

    pub async fn create_message_template(
        &self,
        request: CreateMessageTemplateRequest,
    ) -> Result<MessageTemplate, TemplateError> {
        validate_name_and_content(Some(&request.name), Some(&request.content))?;

        debug!("Creating message template '{}'", request.name);

        let id = Uuid::new_v4();
        let document = json!({
            "_id": id,
            "name": request.name,
            "content": request.content,
            "flow_steps": request.flow_steps,
            "button_actions": request.button_actions,
            "created_at": Utc::now()
        });

        self.store
            .insert_one(MESSAGE_TEMPLATES, document)
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        self.get_message_template(&id.to_string()).await
    }

    pub async fn update_message_template(
        &self,
        template_id: &str,
        request: UpdateMessageTemplateRequest,
    ) -> Result<MessageTemplate, TemplateError> {
        let id = Self::parse_id(template_id)?;

        validate_name_and_content(request.name.as_deref(), request.content.as_deref())?;

        let mut update_data = serde_json::Map::new();
        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(content) = request.content {
            update_data.insert("content".to_string(), json!(content));
        }
        if let Some(flow_steps) = request.flow_steps {
            update_data.insert("flow_steps".to_string(), json!(flow_steps));
        }
        if let Some(button_actions) = request.button_actions {
            update_data.insert("button_actions".to_string(), json!(button_actions));
        }

        if update_data.is_empty() {
            return Err(TemplateError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        let matched = self
            .store
            .update_one(
                MESSAGE_TEMPLATES,
                json!({ "_id": id }),
                json!({ "$set": Value::Object(update_data) }),
            )
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        if matched == 0 {
            return Err(TemplateError::NotFound);
        }

        self.get_message_template(template_id).await
    }

    pub async fn delete_message_template(&self, template_id: &str) -> Result<(), TemplateError> {
        let id = Self::parse_id(template_id)?;

        let deleted = self
            .store
            .delete_one(MESSAGE_TEMPLATES, json!({ "_id": id }))
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        if deleted == 0 {
            return Err(TemplateError::NotFound);
        }

        Ok(())
    }

    pub async fn list_consent_templates(
        &self,
        query: TemplateListQuery,
    ) -> Result<Vec<ConsentTemplate>, TemplateError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);

        let documents = self
            .store
            .find(CONSENT_TEMPLATES, json!({}), None, Some(skip), Some(limit))
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        documents
            .into_iter()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| TemplateError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    pub async fn create_consent_template(
        &self,
        request: CreateConsentTemplateRequest,
    ) -> Result<ConsentTemplate, TemplateError> {
        validate_name_and_content(Some(&request.treatment_type), Some(&request.content))?;

        let id = Uuid::new_v4();
        let document = json!({
            "_id": id,
            "treatment_type": request.treatment_type,
            "content": request.content,
            "digital_signature": request.digital_signature,
            "created_at": Utc::now()
        });

        self.store
            .insert_one(CONSENT_TEMPLATES, document)
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        let created = self
            .store
            .find_one(CONSENT_TEMPLATES, json!({ "_id": id }))
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?
            .ok_or(TemplateError::NotFound)?;

        serde_json::from_value(created).map_err(|e| TemplateError::DatabaseError(e.to_string()))
    }
}
