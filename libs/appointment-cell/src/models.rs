use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub patient_id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    /// Appointment time as HH:MM, kept alongside `date` for exports.
    pub hora: String,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub doctor: String,
    pub treatment_type: Option<String>,
    #[serde(default = "default_reminder")]
    pub reminder_enabled: bool,
    pub created_at: DateTime<Utc>,
}

fn default_reminder() -> bool {
    true
}

fn default_duration() -> i64 {
    30
}

fn default_status() -> AppointmentStatus {
    AppointmentStatus::Scheduled
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub hora: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default = "default_status")]
    pub status: AppointmentStatus,
    pub doctor: String,
    pub treatment_type: Option<String>,
    #[serde(default = "default_reminder")]
    pub reminder_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<String>,
    pub title: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub hora: Option<String>,
    pub duration_minutes: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub doctor: Option<String>,
    pub treatment_type: Option<String>,
    pub reminder_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub doctor: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStats {
    pub total: i64,
    pub today: i64,
    pub completed: i64,
    pub scheduled: i64,
    pub cancelled: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Invalid appointment id")]
    InvalidId,

    #[error("Invalid patient id")]
    InvalidPatientId,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::PatientNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::InvalidId | AppointmentError::InvalidPatientId => {
                AppError::BadRequest(err.to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub(crate) fn validate_appointment_fields(
    title: Option<&str>,
    hora: Option<&str>,
    duration_minutes: Option<i64>,
) -> Result<(), AppointmentError> {
    if let Some(title) = title {
        if title.is_empty() || title.len() > 200 {
            return Err(AppointmentError::ValidationError(
                "Title must be between 1 and 200 characters".to_string(),
            ));
        }
    }
    if let Some(hora) = hora {
        if !is_valid_hora(hora) {
            return Err(AppointmentError::ValidationError(
                "Time must use the HH:MM format".to_string(),
            ));
        }
    }
    if let Some(minutes) = duration_minutes {
        if !(15..=240).contains(&minutes) {
            return Err(AppointmentError::ValidationError(
                "Duration must be between 15 and 240 minutes".to_string(),
            ));
        }
    }
    Ok(())
}

fn is_valid_hora(hora: &str) -> bool {
    let Some((hours, minutes)) = hora.split_once(':') else {
        return false;
    };
    let Ok(h) = hours.parse::<u8>() else {
        return false;
    };
    let Ok(m) = minutes.parse::<u8>() else {
        return false;
    };
    hours.len() == 2 && minutes.len() == 2 && h < 24 && m < 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_hora() {
        assert!(is_valid_hora("09:30"));
        assert!(is_valid_hora("23:59"));
    }

    #[test]
    fn rejects_malformed_hora() {
        assert!(!is_valid_hora("9:30"));
        assert!(!is_valid_hora("24:00"));
        assert!(!is_valid_hora("10:60"));
        assert!(!is_valid_hora("1030"));
    }

    #[test]
    fn rejects_out_of_range_duration() {
        assert!(validate_appointment_fields(None, None, Some(10)).is_err());
        assert!(validate_appointment_fields(None, None, Some(300)).is_err());
        assert!(validate_appointment_fields(None, None, Some(30)).is_ok());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&AppointmentStatus::Scheduled).unwrap();
        assert_eq!(json, "\"scheduled\"");
    }
}
