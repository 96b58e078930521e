use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub whatsapp_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub whatsapp_registered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub whatsapp_registered: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Invalid patient id")]
    InvalidId,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::InvalidId => AppError::BadRequest(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub(crate) fn validate_patient_fields(
    name: Option<&str>,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<(), PatientError> {
    if let Some(name) = name {
        if name.is_empty() || name.len() > 200 {
            return Err(PatientError::ValidationError(
                "Name must be between 1 and 200 characters".to_string(),
            ));
        }
    }
    if let Some(phone) = phone {
        if phone.len() < 9 || phone.len() > 20 {
            return Err(PatientError::ValidationError(
                "Phone must be between 9 and 20 characters".to_string(),
            ));
        }
    }
    if let Some(email) = email {
        if email.len() > 200 {
            return Err(PatientError::ValidationError(
                "Email must be at most 200 characters".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_phone() {
        let result = validate_patient_fields(Some("Ana"), Some("12345"), None);
        assert!(matches!(result, Err(PatientError::ValidationError(_))));
    }

    #[test]
    fn accepts_minimal_patient() {
        assert!(validate_patient_fields(Some("Ana"), Some("664123456"), None).is_ok());
    }

    #[test]
    fn rejects_empty_name() {
        let result = validate_patient_fields(Some(""), None, None);
        assert!(matches!(result, Err(PatientError::ValidationError(_))));
    }
}
