use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::DocumentStore;

use crate::models::CommunicationError;

const LOGS: &str = "communication_logs";
const TEMPLATES: &str = "communication_templates";
const CAMPAIGNS: &str = "communication_campaigns";
const PREFERENCES: &str = "patient_communication_preferences";

fn pct(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        ((part as f64 / whole as f64) * 10_000.0).round() / 100.0
    } else {
        0.0
    }
}

/// One log document per outbound message. The automation jobs use these
/// records both for analytics and for idempotency.
pub struct DeliveryLogService {
    store: DocumentStore,
}

impl DeliveryLogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    pub async fn record(
        &self,
        appointment_id: Option<&str>,
        patient_id: &str,
        log_type: &str,
        channel_type: &str,
        template_id: Option<&str>,
        campaign_id: Option<&str>,
    ) -> Result<(), CommunicationError> {
        self.store
            .insert_one(
                LOGS,
                json!({
                    "_id": Uuid::new_v4(),
                    "appointment_id": appointment_id,
                    "patient_id": patient_id,
                    "type": log_type,
                    "channel_type": channel_type,
                    "template_id": template_id,
                    "campaign_id": campaign_id,
                    "status": "sent",
                    "sent_at": Utc::now()
                }),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Idempotency check for follow-up jobs.
    pub async fn already_sent(
        &self,
        appointment_id: &str,
        log_type: &str,
    ) -> Result<bool, CommunicationError> {
        let existing = self
            .store
            .find_one(
                LOGS,
                json!({ "appointment_id": appointment_id, "type": log_type }),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(existing.is_some())
    }
}

pub struct DeliveryAnalyticsService {
    store: DocumentStore,
}

impl DeliveryAnalyticsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: DocumentStore::new(config),
        }
    }

    fn db_err(e: anyhow::Error) -> CommunicationError {
        CommunicationError::DatabaseError(e.to_string())
    }

    fn period(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = to.unwrap_or_else(Utc::now);
        let start = from.unwrap_or(end - Duration::days(30));
        (start, end)
    }

    pub async fn overview(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, CommunicationError> {
        let (start, end) = Self::period(from, to);
        let in_period = json!({ "sent_at": { "$gte": start, "$lte": end } });

        let total_sent = self
            .store
            .count(LOGS, in_period.clone())
            .await
            .map_err(Self::db_err)?;
        let total_delivered = self
            .store
            .count(
                LOGS,
                json!({ "sent_at": { "$gte": start, "$lte": end }, "status": "delivered" }),
            )
            .await
            .map_err(Self::db_err)?;
        let total_opened = self
            .store
            .count(
                LOGS,
                json!({ "sent_at": { "$gte": start, "$lte": end }, "opened_at": { "$exists": true } }),
            )
            .await
            .map_err(Self::db_err)?;
        let total_clicked = self
            .store
            .count(
                LOGS,
                json!({ "sent_at": { "$gte": start, "$lte": end }, "clicked_at": { "$exists": true } }),
            )
            .await
            .map_err(Self::db_err)?;
        let total_replied = self
            .store
            .count(
                LOGS,
                json!({ "sent_at": { "$gte": start, "$lte": end }, "replied_at": { "$exists": true } }),
            )
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "period": { "from": start, "to": end },
            "global_metrics": {
                "total_sent": total_sent,
                "total_delivered": total_delivered,
                "total_opened": total_opened,
                "total_clicked": total_clicked,
                "total_replied": total_replied,
                "delivery_rate": pct(total_delivered, total_sent),
                "open_rate": pct(total_opened, total_delivered),
                "click_rate": pct(total_clicked, total_opened),
                "response_rate": pct(total_replied, total_sent)
            }
        }))
    }

    pub async fn channels(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, CommunicationError> {
        let (start, end) = Self::period(from, to);

        let rows = self
            .store
            .aggregate(
                LOGS,
                json!([
                    { "$match": { "sent_at": { "$gte": start, "$lte": end } } },
                    { "$group": {
                        "_id": "$channel_type",
                        "sent": { "$sum": 1 },
                        "delivered": { "$sum": { "$cond": [{ "$eq": ["$status", "delivered"] }, 1, 0] } },
                        "opened": { "$sum": { "$cond": [{ "$ne": ["$opened_at", Value::Null] }, 1, 0] } },
                        "clicked": { "$sum": { "$cond": [{ "$ne": ["$clicked_at", Value::Null] }, 1, 0] } },
                        "failed": { "$sum": { "$cond": [{ "$eq": ["$status", "failed"] }, 1, 0] } }
                    } }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        let mut channels = serde_json::Map::new();
        for row in rows {
            let Some(channel) = row["_id"].as_str() else {
                continue;
            };
            let sent = row["sent"].as_i64().unwrap_or(0);
            let delivered = row["delivered"].as_i64().unwrap_or(0);
            channels.insert(
                channel.to_string(),
                json!({
                    "sent": sent,
                    "delivered": delivered,
                    "opened": row["opened"].as_i64().unwrap_or(0),
                    "clicked": row["clicked"].as_i64().unwrap_or(0),
                    "failed": row["failed"].as_i64().unwrap_or(0),
                    "delivery_rate": pct(delivered, sent),
                    "open_rate": pct(row["opened"].as_i64().unwrap_or(0), delivered)
                }),
            );
        }

        Ok(json!({
            "period": { "from": start, "to": end },
            "channel_metrics": channels
        }))
    }

    pub async fn template_performance(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Value, CommunicationError> {
        let (start, end) = Self::period(from, to);
        let limit = limit.clamp(1, 100);

        let rows = self
            .store
            .aggregate(
                LOGS,
                json!([
                    { "$match": { "sent_at": { "$gte": start, "$lte": end } } },
                    { "$group": {
                        "_id": "$template_id",
                        "sent": { "$sum": 1 },
                        "delivered": { "$sum": { "$cond": [{ "$eq": ["$status", "delivered"] }, 1, 0] } },
                        "opened": { "$sum": { "$cond": [{ "$ne": ["$opened_at", Value::Null] }, 1, 0] } },
                        "clicked": { "$sum": { "$cond": [{ "$ne": ["$clicked_at", Value::Null] }, 1, 0] } },
                        "replied": { "$sum": { "$cond": [{ "$ne": ["$replied_at", Value::Null] }, 1, 0] } }
                    } },
                    { "$sort": { "sent": -1 } },
                    { "$limit": limit }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        let mut performance = Vec::with_capacity(rows.len());
        for row in rows {
            let template_id = row["_id"].as_str().unwrap_or_default().to_string();

            let (name, channel_type) = match Uuid::parse_str(&template_id) {
                Ok(id) => {
                    let template = self
                        .store
                        .find_one(TEMPLATES, json!({ "_id": id }))
                        .await
                        .map_err(Self::db_err)?;
                    match template {
                        Some(t) => (
                            t.get("name")
                                .and_then(|n| n.as_str())
                                .unwrap_or("Unknown")
                                .to_string(),
                            t.get("type")
                                .and_then(|n| n.as_str())
                                .unwrap_or("unknown")
                                .to_string(),
                        ),
                        None => ("Unknown".to_string(), "unknown".to_string()),
                    }
                }
                Err(_) => ("No template".to_string(), "unknown".to_string()),
            };

            let delivered = row["delivered"].as_i64().unwrap_or(0);
            let opened = row["opened"].as_i64().unwrap_or(0);
            let sent = row["sent"].as_i64().unwrap_or(0);

            performance.push(json!({
                "template_id": template_id,
                "template_name": name,
                "type": channel_type,
                "sent": sent,
                "open_rate": pct(opened, delivered),
                "click_rate": pct(row["clicked"].as_i64().unwrap_or(0), opened),
                "response_rate": pct(row["replied"].as_i64().unwrap_or(0), sent)
            }));
        }

        Ok(json!({ "template_performance": performance }))
    }

    pub async fn trends(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Value, CommunicationError> {
        let (start, end) = Self::period(from, to);

        let rows = self
            .store
            .aggregate(
                LOGS,
                json!([
                    { "$match": { "sent_at": { "$gte": start, "$lte": end } } },
                    { "$group": {
                        "_id": {
                            "year": { "$year": { "$toDate": "$sent_at" } },
                            "month": { "$month": { "$toDate": "$sent_at" } },
                            "day": { "$dayOfMonth": { "$toDate": "$sent_at" } }
                        },
                        "sent": { "$sum": 1 },
                        "delivered": { "$sum": { "$cond": [{ "$eq": ["$status", "delivered"] }, 1, 0] } },
                        "opened": { "$sum": { "$cond": [{ "$ne": ["$opened_at", Value::Null] }, 1, 0] } }
                    } },
                    { "$sort": { "_id.year": 1, "_id.month": 1, "_id.day": 1 } }
                ]),
            )
            .await
            .map_err(Self::db_err)?;

        let trends: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                json!({
                    "date": format!(
                        "{}-{:02}-{:02}",
                        row["_id"]["year"].as_i64().unwrap_or(0),
                        row["_id"]["month"].as_i64().unwrap_or(0),
                        row["_id"]["day"].as_i64().unwrap_or(0)
                    ),
                    "sent": row["sent"],
                    "delivered": row["delivered"],
                    "opened": row["opened"]
                })
            })
            .collect();

        Ok(json!({ "trends": trends }))
    }

    pub async fn summary(&self) -> Result<Value, CommunicationError> {
        let total_templates = self
            .store
            .count(TEMPLATES, json!({}))
            .await
            .map_err(Self::db_err)?;
        let active_templates = self
            .store
            .count(TEMPLATES, json!({ "is_active": true }))
            .await
            .map_err(Self::db_err)?;
        let total_campaigns = self
            .store
            .count(CAMPAIGNS, json!({}))
            .await
            .map_err(Self::db_err)?;
        let completed_campaigns = self
            .store
            .count(CAMPAIGNS, json!({ "status": "completed" }))
            .await
            .map_err(Self::db_err)?;
        let patients_with_preferences = self
            .store
            .count(PREFERENCES, json!({}))
            .await
            .map_err(Self::db_err)?;

        let last_week = Utc::now() - Duration::days(7);
        let messages_last_week = self
            .store
            .count(LOGS, json!({ "sent_at": { "$gte": last_week } }))
            .await
            .map_err(Self::db_err)?;

        Ok(json!({
            "summary": {
                "total_templates": total_templates,
                "active_templates": active_templates,
                "total_campaigns": total_campaigns,
                "completed_campaigns": completed_campaigns,
                "patients_with_preferences": patients_with_preferences,
                "messages_last_7_days": messages_last_week
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_guard_division_by_zero() {
        assert_eq!(pct(5, 0), 0.0);
        assert_eq!(pct(1, 4), 25.0);
        assert_eq!(pct(1, 3), 33.33);
    }
}
