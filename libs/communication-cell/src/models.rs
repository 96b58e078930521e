use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Sms,
    Whatsapp,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateCategory {
    #[serde(rename = "reminder_24h")]
    Reminder24h,
    #[serde(rename = "reminder_2h")]
    Reminder2h,
    #[serde(rename = "confirmation")]
    Confirmation,
    #[serde(rename = "post_visit")]
    PostVisit,
    #[serde(rename = "no_show_followup")]
    NoShowFollowup,
    #[serde(rename = "promotional")]
    Promotional,
}

fn default_variables() -> Vec<String> {
    vec![
        "patient_name".to_string(),
        "appointment_date".to_string(),
        "appointment_time".to_string(),
        "dentist_name".to_string(),
    ]
}

fn default_timezone() -> String {
    "Europe/Madrid".to_string()
}

fn default_true() -> bool {
    true
}

/// When a template fires relative to its triggering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTiming {
    pub hours_before: Option<u32>,
    pub days_after: Option<u32>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationTemplate {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub category: TemplateCategory,
    pub subject: Option<String>,
    pub html_content: String,
    pub text_content: String,
    #[serde(default = "default_variables")]
    pub variables: Vec<String>,
    pub send_timing: SendTiming,
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub category: TemplateCategory,
    pub subject: Option<String>,
    pub html_content: String,
    pub text_content: String,
    #[serde(default = "default_variables")]
    pub variables: Vec<String>,
    pub send_timing: SendTiming,
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateListQuery {
    #[serde(rename = "type")]
    pub channel_type: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Reminder,
    FollowUp,
    Promotional,
    Survey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Cancelled,
}

/// Which patients a campaign addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetCriteria {
    pub patient_segments: Option<Vec<String>>,
    pub treatment_types: Option<Vec<String>>,
    pub doctor: Option<String>,
    pub custom_filters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignChannel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub template_id: String,
    pub send_at: DateTime<Utc>,
    pub delay_hours: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub campaign_type: CampaignType,
    #[serde(default)]
    pub target_criteria: TargetCriteria,
    pub channels: Vec<CampaignChannel>,
    pub status: CampaignStatus,
    #[serde(default)]
    pub recipients_count: i64,
    #[serde(default)]
    pub sent_count: i64,
    #[serde(default)]
    pub delivered_count: i64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub campaign_type: CampaignType,
    #[serde(default)]
    pub target_criteria: TargetCriteria,
    pub channels: Vec<CampaignChannel>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub campaign_type: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// Patient preference blocks. Every field defaults so an absent document
// behaves like a freshly created one.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferredChannels {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub sms: bool,
    #[serde(default = "default_true")]
    pub whatsapp: bool,
    #[serde(default)]
    pub phone_call: bool,
}

impl Default for PreferredChannels {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
            whatsapp: true,
            phone_call: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationTypes {
    #[serde(default = "default_true")]
    pub appointment_reminders: bool,
    #[serde(default = "default_true")]
    pub treatment_reminders: bool,
    #[serde(default)]
    pub promotional_offers: bool,
    #[serde(default = "default_true")]
    pub health_tips: bool,
    #[serde(default = "default_true")]
    pub survey_requests: bool,
}

impl Default for CommunicationTypes {
    fn default() -> Self {
        Self {
            appointment_reminders: true,
            treatment_reminders: true,
            promotional_offers: false,
            health_tips: true,
            survey_requests: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyLimits {
    pub max_sms_per_week: i64,
    pub max_emails_per_week: i64,
    #[serde(default)]
    pub quiet_hours: QuietHours,
}

impl Default for FrequencyLimits {
    fn default() -> Self {
        Self {
            max_sms_per_week: 3,
            max_emails_per_week: 5,
            quiet_hours: QuietHours::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientPreferences {
    pub patient_id: String,
    #[serde(default)]
    pub preferred_channels: PreferredChannels,
    #[serde(default)]
    pub communication_types: CommunicationTypes,
    #[serde(default)]
    pub frequency_limits: FrequencyLimits,
    #[serde(default = "default_language")]
    pub language_preference: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_updated_by")]
    pub updated_by: String,
}

fn default_language() -> String {
    "es".to_string()
}

fn default_updated_by() -> String {
    "system".to_string()
}

impl PatientPreferences {
    /// Defaults returned when a patient never saved preferences.
    pub fn defaults(patient_id: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            preferred_channels: PreferredChannels::default(),
            communication_types: CommunicationTypes::default(),
            frequency_limits: FrequencyLimits::default(),
            language_preference: default_language(),
            updated_at: Utc::now(),
            updated_by: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesRequest {
    #[serde(default)]
    pub preferred_channels: PreferredChannels,
    #[serde(default)]
    pub communication_types: CommunicationTypes,
    #[serde(default)]
    pub frequency_limits: FrequencyLimits,
    #[serde(default = "default_language")]
    pub language_preference: String,
    #[serde(default)]
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkPreferenceUpdate {
    pub patient_id: String,
    pub preferences: PreferencesRequest,
}

// Channel configuration documents.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub from_name: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestEmailQuery {
    pub test_to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestSmsQuery {
    pub test_to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleAutomationQuery {
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsPeriodQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    #[error("Template not found")]
    TemplateNotFound,

    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Invalid id format")]
    InvalidId,

    #[error("{0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email service is not configured")]
    EmailNotConfigured,

    #[error("SMS service is not configured")]
    SmsNotConfigured,

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<CommunicationError> for AppError {
    fn from(err: CommunicationError) -> Self {
        match err {
            CommunicationError::TemplateNotFound
            | CommunicationError::CampaignNotFound
            | CommunicationError::PatientNotFound => AppError::NotFound(err.to_string()),
            CommunicationError::InvalidId
            | CommunicationError::InvalidState(_)
            | CommunicationError::EmailNotConfigured
            | CommunicationError::SmsNotConfigured => AppError::BadRequest(err.to_string()),
            CommunicationError::ValidationError(msg) => AppError::ValidationError(msg),
            CommunicationError::DeliveryFailed(msg) => AppError::ExternalService(msg),
            CommunicationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub fn validate_template_fields(req: &TemplateRequest) -> Result<(), CommunicationError> {
    if req.name.trim().len() < 3 || req.name.len() > 100 {
        return Err(CommunicationError::ValidationError(
            "Template name must be between 3 and 100 characters".to_string(),
        ));
    }
    if req.html_content.trim().is_empty() {
        return Err(CommunicationError::ValidationError(
            "Template content cannot be empty".to_string(),
        ));
    }
    if req.channel_type == ChannelType::Email
        && req.subject.as_deref().map_or(true, |s| s.trim().is_empty())
    {
        return Err(CommunicationError::ValidationError(
            "Subject is required for email templates".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_campaign_fields(req: &CampaignRequest) -> Result<(), CommunicationError> {
    if req.name.trim().len() < 3 || req.name.len() > 150 {
        return Err(CommunicationError::ValidationError(
            "Campaign name must be between 3 and 150 characters".to_string(),
        ));
    }
    if req.channels.is_empty() {
        return Err(CommunicationError::ValidationError(
            "Campaign needs at least one channel".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template_request(channel: ChannelType, subject: Option<&str>) -> TemplateRequest {
        TemplateRequest {
            name: "Recordatorio 24h".to_string(),
            channel_type: channel,
            category: TemplateCategory::Reminder24h,
            subject: subject.map(String::from),
            html_content: "<p>Hola {{ patient_name }}</p>".to_string(),
            text_content: "Hola {{ patient_name }}".to_string(),
            variables: default_variables(),
            send_timing: SendTiming {
                hours_before: Some(24),
                days_after: None,
                timezone: default_timezone(),
            },
            tracking_enabled: true,
            is_active: true,
            created_by: None,
        }
    }

    #[test]
    fn email_template_requires_subject() {
        assert!(validate_template_fields(&template_request(ChannelType::Email, None)).is_err());
        assert!(
            validate_template_fields(&template_request(ChannelType::Email, Some("Cita"))).is_ok()
        );
        assert!(validate_template_fields(&template_request(ChannelType::Sms, None)).is_ok());
    }

    #[test]
    fn campaign_requires_channels() {
        let req = CampaignRequest {
            name: "Campaña navidad".to_string(),
            campaign_type: CampaignType::Promotional,
            target_criteria: TargetCriteria::default(),
            channels: vec![],
            created_by: None,
        };
        assert!(validate_campaign_fields(&req).is_err());
    }

    #[test]
    fn template_category_serializes_with_explicit_names() {
        let json = serde_json::to_value(TemplateCategory::Reminder24h).unwrap();
        assert_eq!(json, "reminder_24h");
        let json = serde_json::to_value(TemplateCategory::NoShowFollowup).unwrap();
        assert_eq!(json, "no_show_followup");
    }

    #[test]
    fn default_preferences_allow_reminders_but_not_promotions() {
        let prefs = PatientPreferences::defaults("p1");
        assert!(prefs.communication_types.appointment_reminders);
        assert!(!prefs.communication_types.promotional_offers);
        assert!(prefs.preferred_channels.email);
        assert!(!prefs.preferred_channels.phone_call);
        assert!(prefs.updated_at <= Utc::now());
    }
}
