use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{ChannelType, CommunicationError, CommunicationTemplate, PatientPreferences};
use crate::services::config::CommunicationConfigService;
use crate::services::delivery::DeliveryLogService;
use crate::services::email::EmailService;
use crate::services::render;
use crate::services::sms::SmsService;
use crate::services::template::CommunicationTemplateService;

const APPOINTMENTS: &str = "appointments";
const PATIENTS: &str = "patients";
const PREFERENCES: &str = "patient_communication_preferences";

/// Background reminder scheduler. Ticks every minute and fires each job at
/// its configured hour, once per day (the 2h reminder runs hourly). The
/// automation flag in the communication config gates every tick, so the
/// toggle endpoint takes effect without restarting anything.
pub struct AutomationWorker {
    config: Arc<AppConfig>,
    store: DocumentStore,
}

#[derive(Default)]
struct JobLedger {
    reminder_24h: Option<NaiveDate>,
    reminder_2h: Option<(NaiveDate, u32)>,
    no_show_followup: Option<NaiveDate>,
    post_visit: Option<NaiveDate>,
}

impl AutomationWorker {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let store = DocumentStore::new(&config);
        Self { config, store }
    }

    pub fn spawn(config: Arc<AppConfig>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let worker = AutomationWorker::new(config);
            worker.run().await;
        })
    }

    async fn run(&self) {
        info!("Automation worker started");
        let mut ticker = interval(Duration::from_secs(60));
        let mut ledger = JobLedger::default();

        loop {
            ticker.tick().await;

            match CommunicationConfigService::new(&self.config)
                .automation_enabled()
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Automation disabled, skipping tick");
                    continue;
                }
                Err(e) => {
                    warn!("Could not read automation flag, skipping tick: {}", e);
                    continue;
                }
            }

            let now = Utc::now();
            let today = now.date_naive();
            let hour = now.hour();

            if hour == 9 && ledger.reminder_24h != Some(today) {
                ledger.reminder_24h = Some(today);
                if let Err(e) = self.send_24h_reminders().await {
                    error!("24h reminder job failed: {}", e);
                }
            }

            if ledger.reminder_2h != Some((today, hour)) {
                ledger.reminder_2h = Some((today, hour));
                if let Err(e) = self.send_2h_reminders().await {
                    error!("2h reminder job failed: {}", e);
                }
            }

            if hour == 10 && ledger.no_show_followup != Some(today) {
                ledger.no_show_followup = Some(today);
                if let Err(e) = self.followup_no_shows().await {
                    error!("No-show follow-up job failed: {}", e);
                }
            }

            if hour == 11 && ledger.post_visit != Some(today) {
                ledger.post_visit = Some(today);
                if let Err(e) = self.send_post_visit_messages().await {
                    error!("Post-visit job failed: {}", e);
                }
            }
        }
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    fn day_start(date: NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }

    async fn appointments_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: Value,
    ) -> Result<Vec<Value>, CommunicationError> {
        self.store
            .find(
                APPOINTMENTS,
                json!({
                    "date": { "$gte": start, "$lt": end },
                    "status": status
                }),
                None,
                None,
                None,
            )
            .await
            .map_err(Self::db_err)
    }

    async fn patient_for(&self, appointment: &Value) -> Option<Value> {
        let patient_id = appointment.get("patient_id")?.as_str()?;
        let id = uuid::Uuid::parse_str(patient_id).ok()?;
        self.store
            .find_one(PATIENTS, json!({ "_id": id }))
            .await
            .ok()
            .flatten()
    }

    async fn preferences_for(&self, patient_id: &str) -> PatientPreferences {
        let stored = self
            .store
            .find_one(PREFERENCES, json!({ "patient_id": patient_id }))
            .await
            .ok()
            .flatten()
            .and_then(|doc| serde_json::from_value(doc).ok());
        stored.unwrap_or_else(|| PatientPreferences::defaults(patient_id))
    }

    fn template_data(appointment: &Value, patient: &Value) -> Value {
        let date = appointment
            .get("date")
            .and_then(|d| d.as_str())
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_default();

        json!({
            "patient_name": patient.get("name").and_then(|n| n.as_str()).unwrap_or("Paciente"),
            "appointment_date": date,
            "appointment_time": appointment.get("hora").and_then(|h| h.as_str()).unwrap_or(""),
            "dentist_name": appointment.get("doctor").and_then(|d| d.as_str()).unwrap_or("Dr/Dra"),
            "treatment_type": appointment.get("treatment_type").and_then(|t| t.as_str()).unwrap_or("Consulta"),
            "clinic_name": "Clínica Dentaria",
            "clinic_phone": "+34 910 000 000",
            "clinic_address": "Madrid, España"
        })
    }

    /// Picks the first channel the patient accepts and delivers through it.
    /// Returns the channel used so the caller can log the send.
    async fn dispatch(
        &self,
        patient: &Value,
        template: &CommunicationTemplate,
        data: &Value,
        preferences: &PatientPreferences,
    ) -> Option<&'static str> {
        let email = patient.get("email").and_then(|e| e.as_str());
        let phone = patient.get("phone").and_then(|p| p.as_str());
        let configs = CommunicationConfigService::new(&self.config);

        if preferences.preferred_channels.email
            && template.channel_type == ChannelType::Email
        {
            if let Some(email) = email {
                if let Ok(Some(smtp)) = configs.load_smtp().await {
                    let subject = template.subject.as_deref().unwrap_or("Clínica Dentaria");
                    let service = EmailService::new(smtp);
                    match service
                        .send_email(
                            &[email.to_string()],
                            subject,
                            &template.html_content,
                            Some(&template.text_content),
                            data,
                        )
                        .await
                    {
                        Ok(_) => return Some("email"),
                        Err(e) => warn!("Email dispatch failed: {}", e),
                    }
                }
            }
        }

        if preferences.preferred_channels.sms && template.channel_type == ChannelType::Sms {
            if let Some(phone) = phone {
                if let Ok(Some(twilio)) = configs.load_twilio().await {
                    let service = SmsService::new(twilio);
                    match service
                        .send_sms(&[phone.to_string()], &template.text_content, data)
                        .await
                    {
                        Ok(results)
                            if results
                                .first()
                                .map(|r| r["success"].as_bool().unwrap_or(false))
                                .unwrap_or(false) =>
                        {
                            return Some("sms")
                        }
                        Ok(_) => {}
                        Err(e) => warn!("SMS dispatch failed: {}", e),
                    }
                }
            }
        }

        if preferences.preferred_channels.whatsapp {
            if let Some(phone) = phone {
                let message = render::render_template(&template.text_content, data);
                let url = format!("{}/send-message", self.config.whatsapp_service_url);
                let result = reqwest::Client::new()
                    .post(&url)
                    .json(&json!({ "to": phone, "message": message }))
                    .timeout(Duration::from_secs(10))
                    .send()
                    .await;
                match result {
                    Ok(resp) if resp.status().is_success() => return Some("whatsapp"),
                    Ok(resp) => warn!("WhatsApp bridge returned {}", resp.status()),
                    Err(e) => warn!("WhatsApp dispatch failed: {}", e),
                }
            }
        }

        None
    }

    async fn send_24h_reminders(&self) -> Result<(), CommunicationError> {
        info!("Running 24h reminders");

        let tomorrow = Self::day_start(Utc::now().date_naive() + ChronoDuration::days(1));
        let appointments = self
            .appointments_between(tomorrow, tomorrow + ChronoDuration::days(1), json!("scheduled"))
            .await?;
        debug!("Found {} appointments for tomorrow", appointments.len());

        let templates = CommunicationTemplateService::new(&self.config);
        let logs = DeliveryLogService::new(&self.config);
        let mut sent = 0usize;

        for appointment in &appointments {
            let Some(patient) = self.patient_for(appointment).await else {
                continue;
            };
            let patient_id = appointment
                .get("patient_id")
                .and_then(|p| p.as_str())
                .unwrap_or_default();

            let preferences = self.preferences_for(patient_id).await;
            if !preferences.communication_types.appointment_reminders {
                continue;
            }

            let Some(template) = templates.find_active("reminder_24h", "email").await? else {
                warn!("No active reminder_24h template");
                break;
            };

            let data = Self::template_data(appointment, &patient);
            if let Some(channel) = self
                .dispatch(&patient, &template, &data, &preferences)
                .await
            {
                let appointment_id = appointment.get("_id").and_then(|i| i.as_str());
                logs.record(
                    appointment_id,
                    patient_id,
                    "reminder_24h",
                    channel,
                    Some(&template.id.to_string()),
                    None,
                )
                .await?;
                sent += 1;
            }
        }

        info!("24h reminders sent: {}", sent);
        Ok(())
    }

    async fn send_2h_reminders(&self) -> Result<(), CommunicationError> {
        debug!("Running 2h reminders");

        let now = Utc::now();
        let today = Self::day_start(now.date_naive());
        let window_start = (now + ChronoDuration::hours(2)).format("%H:%M").to_string();
        let window_end = (now + ChronoDuration::hours(3)).format("%H:%M").to_string();

        let appointments = self
            .store
            .find(
                APPOINTMENTS,
                json!({
                    "date": { "$gte": today, "$lt": today + ChronoDuration::days(1) },
                    "hora": { "$gte": window_start, "$lt": window_end },
                    "status": "scheduled"
                }),
                None,
                None,
                None,
            )
            .await
            .map_err(Self::db_err)?;

        let templates = CommunicationTemplateService::new(&self.config);
        let logs = DeliveryLogService::new(&self.config);
        let mut sent = 0usize;

        for appointment in &appointments {
            let Some(patient) = self.patient_for(appointment).await else {
                continue;
            };
            let patient_id = appointment
                .get("patient_id")
                .and_then(|p| p.as_str())
                .unwrap_or_default();

            let preferences = self.preferences_for(patient_id).await;
            if !preferences.communication_types.appointment_reminders {
                continue;
            }

            // Short-notice reminders go out over SMS first
            let Some(template) = templates.find_active("reminder_2h", "sms").await? else {
                warn!("No active reminder_2h template");
                break;
            };

            let data = Self::template_data(appointment, &patient);
            if let Some(channel) = self
                .dispatch(&patient, &template, &data, &preferences)
                .await
            {
                logs.record(
                    appointment.get("_id").and_then(|i| i.as_str()),
                    patient_id,
                    "reminder_2h",
                    channel,
                    Some(&template.id.to_string()),
                    None,
                )
                .await?;
                sent += 1;
            }
        }

        if sent > 0 {
            info!("2h reminders sent: {}", sent);
        }
        Ok(())
    }

    async fn followup_no_shows(&self) -> Result<(), CommunicationError> {
        info!("Running no-show follow-up");

        let yesterday = Self::day_start(Utc::now().date_naive() - ChronoDuration::days(1));
        // Still marked scheduled a day later means nobody showed up
        let no_shows = self
            .appointments_between(
                yesterday,
                yesterday + ChronoDuration::days(1),
                json!("scheduled"),
            )
            .await?;

        self.followup_batch(&no_shows, "no_show_followup").await
    }

    async fn send_post_visit_messages(&self) -> Result<(), CommunicationError> {
        info!("Running post-visit follow-up");

        let two_days_ago = Self::day_start(Utc::now().date_naive() - ChronoDuration::days(2));
        let completed = self
            .appointments_between(
                two_days_ago,
                two_days_ago + ChronoDuration::days(1),
                json!("completed"),
            )
            .await?;

        self.followup_batch(&completed, "post_visit").await
    }

    /// Shared follow-up path. A delivery-log lookup keeps both jobs
    /// idempotent across restarts.
    async fn followup_batch(
        &self,
        appointments: &[Value],
        log_type: &str,
    ) -> Result<(), CommunicationError> {
        let templates = CommunicationTemplateService::new(&self.config);
        let logs = DeliveryLogService::new(&self.config);
        let mut sent = 0usize;

        for appointment in appointments {
            let Some(appointment_id) = appointment.get("_id").and_then(|i| i.as_str()) else {
                continue;
            };
            if logs.already_sent(appointment_id, log_type).await? {
                continue;
            }

            let Some(patient) = self.patient_for(appointment).await else {
                continue;
            };
            let patient_id = appointment
                .get("patient_id")
                .and_then(|p| p.as_str())
                .unwrap_or_default();
            let preferences = self.preferences_for(patient_id).await;

            let Some(template) = templates.find_active(log_type, "email").await? else {
                warn!("No active {} template", log_type);
                break;
            };

            let data = Self::template_data(appointment, &patient);
            if let Some(channel) = self
                .dispatch(&patient, &template, &data, &preferences)
                .await
            {
                logs.record(
                    Some(appointment_id),
                    patient_id,
                    log_type,
                    channel,
                    Some(&template.id.to_string()),
                    None,
                )
                .await?;
                sent += 1;
            }
        }

        info!("{} messages sent: {}", log_type, sent);
        Ok(())
    }
}
