use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChurnRisk {
    Low,
    Medium,
    High,
}

/// Behavioural segment derived from spend and visit cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSegment {
    pub value_category: String,
    pub frequency: String,
    pub loyalty_score: f64,
    pub price_sensitivity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Invalid patient id")]
    InvalidId,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::PatientNotFound => AppError::NotFound(err.to_string()),
            AnalyticsError::InvalidId => AppError::BadRequest(err.to_string()),
            AnalyticsError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
