use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::{
    validate_campaign_fields, Campaign, CampaignListQuery, CampaignRequest, CampaignStatus,
    CommunicationError,
};
use crate::services::delivery::DeliveryLogService;
use crate::services::render;
use crate::services::template::CommunicationTemplateService;

const COLLECTION: &str = "communication_campaigns";
const PATIENTS: &str = "patients";

pub struct CampaignService {
    store: DocumentStore,
}

impl CampaignService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn parse_id(campaign_id: &str) -> Result<Uuid, CommunicationError> {
        Uuid::parse_str(campaign_id).map_err(|_| CommunicationError::InvalidId)
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    pub async fn list(&self, query: CampaignListQuery) -> Result<Vec<Campaign>, CommunicationError> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(100).clamp(1, 500);

        let mut filter = serde_json::Map::new();
        if let Some(status) = query.status {
            filter.insert("status".to_string(), json!(status));
        }
        if let Some(campaign_type) = query.campaign_type {
            filter.insert("type".to_string(), json!(campaign_type));
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

    pub async fn get(&self, campaign_id: &str) -> Result<Campaign, CommunicationError> {
        let id = Self::parse_id(campaign_id)?;

        let document = self
            .store
            .find_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?
            .ok_or(CommunicationError::CampaignNotFound)?;

        serde_json::from_value(document).map_err(|e| Self::db_err(e.into()))
    }

    /// Campaigns always start life as drafts.
    pub async fn create(&self, request: CampaignRequest) -> Result<Campaign, CommunicationError> {
        validate_campaign_fields(&request)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let document = json!({
            "_id": id,
            "name": request.name,
            "type": request.campaign_type,
            "target_criteria": request.target_criteria,
            "channels": request.channels,
            "status": CampaignStatus::Draft,
            "recipients_count": 0,
            "sent_count": 0,
            "delivered_count": 0,
            "scheduled_at": Value::Null,
            "completed_at": Value::Null,
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

    pub async fn update(
        &self,
        campaign_id: &str,
        request: CampaignRequest,
    ) -> Result<Campaign, CommunicationError> {
        let id = Self::parse_id(campaign_id)?;
        validate_campaign_fields(&request)?;

        let existing = self.get(campaign_id).await?;

        let matched = self
            .store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": {
                    "name": request.name,
                    "type": request.campaign_type,
                    "target_criteria": request.target_criteria,
                    "channels": request.channels,
                    "created_at": existing.created_at,
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        if matched == 0 {
            return Err(CommunicationError::CampaignNotFound);
        }

        self.get(campaign_id).await
    }

    /// Running or finished campaigns keep their history.
    pub async fn delete(&self, campaign_id: &str) -> Result<(), CommunicationError> {
        let id = Self::parse_id(campaign_id)?;
        let campaign = self.get(campaign_id).await?;

        if matches!(
            campaign.status,
            CampaignStatus::Sending | CampaignStatus::Completed
        ) {
            return Err(CommunicationError::InvalidState(
                "Campaigns that are sending or completed cannot be deleted".to_string(),
            ));
        }

        self.store
            .delete_one(COLLECTION, json!({ "_id": id }))
            .await
            .map_err(Self::db_err)?;

        Ok(())
    }

    /// Moves a draft to scheduled and hands processing to a background task.
    pub async fn send(
        &self,
        campaign_id: &str,
        config: Arc<AppConfig>,
    ) -> Result<Value, CommunicationError> {
        let id = Self::parse_id(campaign_id)?;
        let campaign = self.get(campaign_id).await?;

        if campaign.status != CampaignStatus::Draft {
            return Err(CommunicationError::InvalidState(
                "Only draft campaigns can be sent".to_string(),
            ));
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": {
                    "status": CampaignStatus::Scheduled,
                    "scheduled_at": Utc::now(),
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        let campaign_id = campaign_id.to_string();
        tokio::spawn(async move {
            let service = CampaignService::new(&config);
            if let Err(e) = service.process(&campaign_id, &config).await {
                error!("Campaign {} processing failed: {}", campaign_id, e);
                let _ = service.mark_cancelled(&campaign_id, &e.to_string()).await;
            }
        });

        Ok(json!({
            "success": true,
            "message": "Campaign scheduled for delivery",
            "campaign_id": campaign.id
        }))
    }

    pub async fn cancel(&self, campaign_id: &str) -> Result<Value, CommunicationError> {
        let id = Self::parse_id(campaign_id)?;
        let campaign = self.get(campaign_id).await?;

        if !matches!(
            campaign.status,
            CampaignStatus::Scheduled | CampaignStatus::Sending
        ) {
            return Err(CommunicationError::InvalidState(
                "Only scheduled or sending campaigns can be cancelled".to_string(),
            ));
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": {
                    "status": CampaignStatus::Cancelled,
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({ "success": true, "message": "Campaign cancelled" }))
    }

    async fn mark_cancelled(&self, campaign_id: &str, reason: &str) -> Result<(), CommunicationError> {
        let id = Self::parse_id(campaign_id)?;
        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": {
                    "status": CampaignStatus::Cancelled,
                    "error": reason,
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Walks the targeted patients, renders each channel's template and
    /// records a delivery log per send.
    async fn process(
        &self,
        campaign_id: &str,
        config: &AppConfig,
    ) -> Result<(), CommunicationError> {
        let id = Self::parse_id(campaign_id)?;
        let campaign = self.get(campaign_id).await?;

        if campaign.status != CampaignStatus::Scheduled {
            return Ok(());
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": { "status": CampaignStatus::Sending, "updated_at": Utc::now() } }),
            )
            .await
            .map_err(Self::db_err)?;

        let recipients = self.resolve_recipients(&campaign).await?;
        info!(
            "Campaign {} targeting {} patients",
            campaign.name,
            recipients.len()
        );

        let templates = CommunicationTemplateService::new(config);
        let logs = DeliveryLogService::new(config);
        let mut sent = 0i64;

        for channel in &campaign.channels {
            let template = match templates.get(&channel.template_id).await {
                Ok(t) => t,
                Err(e) => {
                    error!(
                        "Campaign {} skipping channel, template missing: {}",
                        campaign.name, e
                    );
                    continue;
                }
            };

            for patient in &recipients {
                let data = json!({
                    "patient_name": patient.get("name").and_then(|n| n.as_str()).unwrap_or("Paciente"),
                    "clinic_name": "Clínica Dentaria"
                });
                let body = render::render_template(&template.text_content, &data);

                logs.record(
                    None,
                    patient.get("_id").and_then(|i| i.as_str()).unwrap_or(""),
                    "campaign",
                    channel.channel_type.as_str(),
                    Some(&template.id.to_string()),
                    Some(&campaign.id.to_string()),
                )
                .await?;

                tracing::debug!(
                    "Campaign {} rendered {} chars for {}",
                    campaign.name,
                    body.len(),
                    channel.channel_type.as_str()
                );
                sent += 1;
            }
        }

        self.store
            .update_one(
                COLLECTION,
                json!({ "_id": id }),
                json!({ "$set": {
                    "status": CampaignStatus::Completed,
                    "recipients_count": recipients.len() as i64,
                    "sent_count": sent,
                    "completed_at": Utc::now(),
                    "updated_at": Utc::now()
                } }),
            )
            .await
            .map_err(Self::db_err)?;

        info!("Campaign {} completed, {} sends", campaign.name, sent);
        Ok(())
    }

    async fn resolve_recipients(
        &self,
        campaign: &Campaign,
    ) -> Result<Vec<Value>, CommunicationError> {
        let mut filter = serde_json::Map::new();
        if let Some(custom) = &campaign.target_criteria.custom_filters {
            if let Some(obj) = custom.as_object() {
                for (key, value) in obj {
                    filter.insert(key.clone(), value.clone());
                }
            }
        }

        self.store
            .find(PATIENTS, Value::Object(filter), None, None, Some(1000))
            .await
            .map_err(Self::db_err)
    }
}
