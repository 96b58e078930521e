use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    validate_template_fields, CommunicationError, CommunicationTemplate, TemplateListQuery,
    TemplateRequest,
};
use crate::services::render;

const COLLECTION: &str = "communication_templates";

pub struct CommunicationTemplateService {
    store: DocumentStore,
}

impl CommunicationTemplateService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn parse_id(template_id: &str) -> Result<Uuid, CommunicationError> {
        Uuid::parse_str(template_id).map_err(|_| CommunicationError::InvalidId)
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    pub async fn list(
        &self,
        query: TemplateListQuery,
    ) -> Result<Vec<CommunicationTemplate>, CommunicationError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 500);

        let mut filter = serde_json::Map::new();
        if let Some(channel_type) = query.channel_type {
            filter.insert("type".to_string(), json!(channel_type));
        }
        if let Some(category) = query.category {
            filter.insert("category".to_string(), json!(category));
        }
        if let Some(is_active) = query.is_active {
            filter.insert("is_active".to_string(), json!(is_active));
        }

        let documents = self
            .store
            .find(
                COLLECTION,
                Value::Object(filter),
                Some(json!({ "created_at": -1 })),
                Some(skip),
                Some(limit),
            )
            .await
            .map_err(Self::db_err)?;

        documents
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(|e| Self::db_err(e.into())))
            .collect()
    }

    pub async fn get(&self, template_id: &str) -> Result<CommunicationTemplate, CommunicationError> {
        let id = Self::parse_id(template_id)?;

        let document = self
            .store
            .find_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(CommunicationError::TemplateNotFound)?;

        serde_json::from_value(document).map_err(|e| Self::db_err(e.into()))
    }

    pub async fn create(
        &self,
        request: TemplateRequest,
    ) -> Result<CommunicationTemplate, CommunicationError> {
        validate_template_fields(&request)?;

        debug!("Creating communication template '{}'", request.name);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let document = json!({
            "_id": id,
            "name": request.name,
            "type": request.channel_type,
            "category": request.category,
            "subject": request.subject,
            "html_content": request.html_content,
            "text_content": request.text_content,
            "variables": request.variables,
            "send_timing": request.send_timing,
            "tracking_enabled": request.tracking_enabled,
            "is_active": request.is_active,
            "created_at": now,
            "updated_at": now,
            "created_by": request.created_by.unwrap_or_else(|| "admin".to_string())
        });

        self.store
            .insert_one(COLLECTION, document)
            .await
            .map_err(Self::db_err)?;

        self.get(&id.to_string()).await
    }

    /// Full replace except creation metadata.
    pub async fn update(
        &self,
        template_id: &str,
        request: TemplateRequest,
    ) -> Result<CommunicationTemplate, CommunicationError> {
        let id = Self::parse_id(template_id)?;
        validate_template_fields(&request)?;

        let existing = self.get(template_id).await?;

        let matched = self
            .store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": {
                    "name": request.name,
                    "type": request.channel_type,
                    "category": request.category,
                    "subject": request.subject,
                    "html_content": request.html_content,
                    "text_content": request.text_content,
                    "variables": request.variables,
                    "send_timing": request.send_timing,
                    "tracking_enabled": request.tracking_enabled,
                    "is_active": request.is_active,
                    "created_at": existing.created_at,
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        if matched == 0 {
            return Err(CommunicationError::TemplateNotFound);
        }

        self.get(template_id).await
    }

    pub async fn delete(&self, template_id: &str) -> Result<(), CommunicationError> {
        let id = Self::parse_id(template_id)?;

        let deleted = self
            .store
            .delete_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?;

        if deleted == 0 {
            return Err(CommunicationError::TemplateNotFound);
        }

        Ok(())
    }

    /// Renders both bodies with the supplied sample data.
    pub async fn preview(
        &self,
        template_id: &str,
        template_data: Value,
    ) -> Result<Value, CommunicationError> {
        let template = self.get(template_id).await?;

        let html = render::render_template(&template.html_content, &template_data);
        let text = render::render_template(&template.text_content, &template_data);

        Ok(json!({
            "template_id": template_id,
            "template_name": template.name,
            "type": template.channel_type,
            "subject": template.subject,
            "html_content": html,
            "text_content": text,
            "template_data": template_data
        }))
    }

    /// Active template for an automation job's category and channel.
    pub async fn find_active(
        &self,
        category: &str,
        channel_type: &str,
    ) -> Result<Option<CommunicationTemplate>, CommunicationError> {
        let document = self
            .store
            .find_one(
                COLLECTION,
                json!({
                    "category": category,
                    "type": channel_type,
                    "is_active": true
                }),
            )
            .await
            .map_err(Self::db_err)?;

        document
            .map(|doc| serde_json::from_value(doc).map_err(|e| Self::db_err(e.into())))
            .transpose()
    }
}
