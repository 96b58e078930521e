use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonAction {
    pub text: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStep {
    pub content: String,
    #[serde(default)]
    pub buttons: Vec<ButtonAction>,
}

/// Reusable WhatsApp message template, optionally with a multi-step flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub flow_steps: Vec<TemplateStep>,
    #[serde(default)]
    pub button_actions: Vec<ButtonAction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageTemplateRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub flow_steps: Vec<TemplateStep>,
    #[serde(default)]
    pub button_actions: Vec<ButtonAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessageTemplateRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub flow_steps: Option<Vec<TemplateStep>>,
    pub button_actions: Option<Vec<ButtonAction>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentTemplate {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub treatment_type: String,
    pub content: String,
    #[serde(default = "default_signature")]
    pub digital_signature: bool,
    pub created_at: DateTime<Utc>,
}

fn default_signature() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsentTemplateRequest {
    pub treatment_type: String,
    pub content: String,
    #[serde(default = "default_signature")]
    pub digital_signature: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template not found")]
    NotFound,

    #[error("Invalid template id")]
    InvalidId,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound => AppError::NotFound(err.to_string()),
            TemplateError::InvalidId => AppError::BadRequest(err.to_string()),
            TemplateError::ValidationError(msg) => AppError::ValidationError(msg),
            TemplateError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub(crate) fn validate_name_and_content(
    name: Option<&str>,
    content: Option<&str>,
) -> Result<(), TemplateError> {
    if let Some(name) = name {
        if name.is_empty() || name.len() > 200 {
            return Err(TemplateError::ValidationError(
                "Name must be between 1 and 200 characters".to_string(),
            ));
        }
    }
    if let Some(content) = content {
        if content.is_empty() {
            return Err(TemplateError::ValidationError(
                "Content cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_content() {
        assert!(validate_name_and_content(Some("Bienvenida"), Some("")).is_err());
    }

    #[test]
    fn flow_steps_default_to_empty() {
        let template: CreateMessageTemplateRequest = serde_json::from_value(serde_json::json!({
            "name": "Bienvenida",
            "content": "Hola {{ name }}"
        }))
        .unwrap();
        assert!(template.flow_steps.is_empty());
        assert!(template.button_actions.is_empty());
    }
}
