use chrono::Utc;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{CommunicationError, SmtpSettings, TwilioSettings};

const COLLECTION: &str = "communication_config";

/// Channel credentials and automation switches live in a single document.
pub struct CommunicationConfigService {
    store: DocumentStore,
    whatsapp_service_url: String,
}

impl CommunicationConfigService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
            whatsapp_service_url: config.whatsapp_service_url.clone(),
        }
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    async fn config_doc(&self) -> Result<Option<Value>, CommunicationError> {
        self.store
            .find_one(COLLECTION, json!({}))
            .await
            .map_err(Self::db_err)
    }

    /// SMTP settings with the password stripped. The password never leaves
    /// the database through this endpoint.
    pub async fn get_smtp(&self) -> Result<Value, CommunicationError> {
        let Some(config) = self.config_doc().await? else {
            return Ok(json!({ "configured": false }));
        };
        let Some(smtp) = config.get("smtp").filter(|s| !s.is_null()) else {
            return Ok(json!({ "configured": false }));
        };

        Ok(json!({
            "configured": true,
            "server": smtp.get("server"),
            "port": smtp.get("port"),
            "username": smtp.get("username"),
            "use_tls": smtp.get("use_tls").and_then(|v| v.as_bool()).unwrap_or(true),
            "from_name": smtp.get("from_name"),
            "from_email": smtp.get("from_email")
        }))
    }

    pub async fn set_smtp(&self, settings: SmtpSettings) -> Result<Value, CommunicationError> {
        self.store
            .upsert_one(
                COLLECTION,
                json!({}),
                json!({ "$set": {
                    "smtp": settings,
                    "updated_at": Utc::now(),
                    "updated_by": "admin"
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({ "success": true, "message": "SMTP configuration updated" }))
    }

    pub async fn get_sms(&self) -> Result<Value, CommunicationError> {
        let Some(config) = self.config_doc().await? else {
            return Ok(json!({ "configured": false }));
        };
        let Some(twilio) = config.get("twilio").filter(|s| !s.is_null()) else {
            return Ok(json!({ "configured": false }));
        };

        // The auth token stays server-side
        Ok(json!({
            "configured": true,
            "account_sid": twilio.get("account_sid"),
            "from_number": twilio.get("from_number")
        }))
    }

    pub async fn set_sms(&self, settings: TwilioSettings) -> Result<Value, CommunicationError> {
        if !settings.from_number.starts_with('+') {
            return Err(CommunicationError::ValidationError(
                "Sender number must include the country code prefix".to_string(),
            ));
        }

        self.store
            .upsert_one(
                COLLECTION,
                json!({}),
                json!({ "$set": {
                    "twilio": settings,
                    "updated_at": Utc::now(),
                    "updated_by": "admin"
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({ "success": true, "message": "SMS configuration updated" }))
    }

    pub async fn get_whatsapp(&self) -> Result<Value, CommunicationError> {
        let service_url = self
            .config_doc()
            .await?
            .as_ref()
            .and_then(|c| c.get("whatsapp"))
            .and_then(|w| w.get("service_url"))
            .and_then(|u| u.as_str())
            .map(String::from)
            .unwrap_or_else(|| self.whatsapp_service_url.clone());

        Ok(json!({ "configured": true, "service_url": service_url }))
    }

    /// Full SMTP credentials for the delivery path.
    pub async fn load_smtp(&self) -> Result<Option<SmtpSettings>, CommunicationError> {
        let Some(config) = self.config_doc().await? else {
            return Ok(None);
        };
        config
            .get("smtp")
            .filter(|s| !s.is_null())
            .cloned()
            .map(|smtp| serde_json::from_value(smtp).map_err(|e| Self::db_err(e.into())))
            .transpose()
    }

    pub async fn load_twilio(&self) -> Result<Option<TwilioSettings>, CommunicationError> {
        let Some(config) = self.config_doc().await? else {
            return Ok(None);
        };
        config
            .get("twilio")
            .filter(|s| !s.is_null())
            .cloned()
            .map(|twilio| serde_json::from_value(twilio).map_err(|e| Self::db_err(e.into())))
            .transpose()
    }

    /// Reminder switch with its default. A missing document or field means
    /// automation is on; only an explicit toggle turns it off.
    fn reminders_flag(config: Option<&Value>) -> bool {
        config
            .and_then(|c| c.get("enable_auto_reminders"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    pub async fn automation_status(&self) -> Result<Value, CommunicationError> {
        let config = self.config_doc().await?;
        let auto_reminders = Self::reminders_flag(config.as_ref());

        Ok(json!({
            "automation_enabled": auto_reminders,
            "auto_reminders": auto_reminders,
            "no_show_followup": config
                .as_ref()
                .and_then(|c| c.get("enable_no_show_followup"))
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            "scheduler_running": auto_reminders,
            "daily_limits": {
                "email": config
                    .as_ref()
                    .and_then(|c| c.get("daily_email_limit"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(1000),
                "sms": config
                    .as_ref()
                    .and_then(|c| c.get("daily_sms_limit"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(500)
            }
        }))
    }

    pub async fn toggle_automation(&self, enable: bool) -> Result<Value, CommunicationError> {
        self.store
            .upsert_one(
                COLLECTION,
                json!({}),
                json!({ "$set": {
                    "enable_auto_reminders": enable,
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "success": true,
            "enabled": enable,
            "message": if enable { "Automation enabled" } else { "Automation disabled" }
        }))
    }

    /// Gate checked by the worker on every tick. Shares the default with
    /// `automation_status` so the endpoint and the worker always agree.
    pub async fn automation_enabled(&self) -> Result<bool, CommunicationError> {
        let config = self.config_doc().await?;
        Ok(Self::reminders_flag(config.as_ref()))
    }
}
