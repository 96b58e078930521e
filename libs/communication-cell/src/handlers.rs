use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    AnalyticsPeriodQuery, BulkPreferenceUpdate, CampaignListQuery, CampaignRequest,
    CommunicationError, PreferencesRequest, SmtpSettings, TemplateListQuery, TemplateRequest,
    TestEmailQuery, TestSmsQuery, ToggleAutomationQuery, TwilioSettings,
};
use crate::services::{
    CampaignService, CommunicationConfigService, CommunicationTemplateService,
    DeliveryAnalyticsService, EmailService, PreferencesService, SmsService,
};

// Templates

#[axum::debug_handler]
pub async fn list_templates(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<Value>, AppError> {
    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let service = CommunicationTemplateService::new(&config);
    let templates = service.list(query).await?;
    Ok(Json(json!({
        "templates": templates,
        "count": templates.len(),
        "skip": skip,
        "limit": limit
    })))
}

#[axum::debug_handler]
pub async fn create_template(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = CommunicationTemplateService::new(&config);
    let template = service.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "template": template })),
    ))
}

#[axum::debug_handler]
pub async fn get_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationTemplateService::new(&config);
    let template = service.get(&template_id).await?;
    Ok(Json(serde_json::to_value(template).map_err(|e| {
        AppError::Internal(e.to_string())
    })?))
}

#[axum::debug_handler]
pub async fn update_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
    Json(request): Json<TemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationTemplateService::new(&config);
    let template = service.update(&template_id, request).await?;
    Ok(Json(json!({ "success": true, "template": template })))
}

#[axum::debug_handler]
pub async fn delete_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationTemplateService::new(&config);
    service.delete(&template_id).await?;
    Ok(Json(json!({ "success": true, "message": "Template deleted" })))
}

#[axum::debug_handler]
pub async fn preview_template(
    State(config): State<Arc<AppConfig>>,
    Path(template_id): Path<String>,
    Json(template_data): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationTemplateService::new(&config);
    let preview = service.preview(&template_id, template_data).await?;
    Ok(Json(preview))
}

// Campaigns

#[axum::debug_handler]
pub async fn list_campaigns(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<Value>, AppError> {
    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let service = CampaignService::new(&config);
    let campaigns = service.list(query).await?;
    Ok(Json(json!({
        "campaigns": campaigns,
        "count": campaigns.len(),
        "skip": skip,
        "limit": limit
    })))
}

#[axum::debug_handler]
pub async fn create_campaign(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CampaignRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = CampaignService::new(&config);
    let campaign = service.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "campaign": campaign })),
    ))
}

#[axum::debug_handler]
pub async fn get_campaign(
    State(config): State<Arc<AppConfig>>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CampaignService::new(&config);
    let campaign = service.get(&campaign_id).await?;
    Ok(Json(serde_json::to_value(campaign).map_err(|e| {
        AppError::Internal(e.to_string())
    })?))
}

#[axum::debug_handler]
pub async fn update_campaign(
    State(config): State<Arc<AppConfig>>,
    Path(campaign_id): Path<String>,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<Value>, AppError> {
    let service = CampaignService::new(&config);
    let campaign = service.update(&campaign_id, request).await?;
    Ok(Json(json!({ "success": true, "campaign": campaign })))
}

#[axum::debug_handler]
pub async fn delete_campaign(
    State(config): State<Arc<AppConfig>>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CampaignService::new(&config);
    service.delete(&campaign_id).await?;
    Ok(Json(json!({ "success": true, "message": "Campaign deleted" })))
}

#[axum::debug_handler]
pub async fn send_campaign(
    State(config): State<Arc<AppConfig>>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    info!("Scheduling campaign {}", campaign_id);
    let service = CampaignService::new(&config);
    let result = service.send(&campaign_id, Arc::clone(&config)).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn cancel_campaign(
    State(config): State<Arc<AppConfig>>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = CampaignService::new(&config);
    let result = service.cancel(&campaign_id).await?;
    Ok(Json(result))
}

// Preferences

#[axum::debug_handler]
pub async fn get_preferences(
    State(config): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PreferencesService::new(&config);
    let preferences = service.get(&patient_id).await?;
    Ok(Json(serde_json::to_value(preferences).map_err(|e| {
        AppError::Internal(e.to_string())
    })?))
}

#[axum::debug_handler]
pub async fn update_preferences(
    State(config): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    Json(request): Json<PreferencesRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PreferencesService::new(&config);
    let preferences = service.upsert(&patient_id, request).await?;
    Ok(Json(json!({ "success": true, "preferences": preferences })))
}

#[axum::debug_handler]
pub async fn bulk_update_preferences(
    State(config): State<Arc<AppConfig>>,
    Json(updates): Json<Vec<BulkPreferenceUpdate>>,
) -> Result<Json<Value>, AppError> {
    let service = PreferencesService::new(&config);
    let result = service.bulk_update(updates).await?;
    Ok(Json(result))
}

// Config

#[axum::debug_handler]
pub async fn get_smtp_config(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.get_smtp().await?))
}

#[axum::debug_handler]
pub async fn update_smtp_config(
    State(config): State<Arc<AppConfig>>,
    Json(settings): Json<SmtpSettings>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.set_smtp(settings).await?))
}

#[axum::debug_handler]
pub async fn get_sms_config(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.get_sms().await?))
}

#[axum::debug_handler]
pub async fn update_sms_config(
    State(config): State<Arc<AppConfig>>,
    Json(settings): Json<TwilioSettings>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.set_sms(settings).await?))
}

#[axum::debug_handler]
pub async fn get_whatsapp_config(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.get_whatsapp().await?))
}

#[axum::debug_handler]
pub async fn test_email(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<TestEmailQuery>,
) -> Result<Json<Value>, AppError> {
    let configs = CommunicationConfigService::new(&config);
    let smtp = configs
        .load_smtp()
        .await?
        .ok_or(CommunicationError::EmailNotConfigured)?;

    let service = EmailService::new(smtp);
    let connection = service.test_connection().await?;
    if !connection["success"].as_bool().unwrap_or(false) {
        return Ok(Json(connection));
    }

    let result = service
        .send_email(
            &[query.test_to],
            "Test - Clínica Dentaria",
            "<h1>Test correcto</h1><p>El sistema de comunicación está configurado.</p>",
            Some("Test correcto\n\nEl sistema de comunicación está configurado."),
            &Value::Null,
        )
        .await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn test_sms(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<TestSmsQuery>,
) -> Result<Json<Value>, AppError> {
    let configs = CommunicationConfigService::new(&config);
    let twilio = configs
        .load_twilio()
        .await?
        .ok_or(CommunicationError::SmsNotConfigured)?;

    let service = SmsService::new(twilio);
    let connection = service.test_connection().await?;
    if !connection["success"].as_bool().unwrap_or(false) {
        return Ok(Json(connection));
    }

    let results = service
        .send_sms(
            &[query.test_to],
            "Test Clínica Dentaria: sistema de comunicación configurado.",
            &Value::Null,
        )
        .await?;
    Ok(Json(json!({ "success": true, "results": results })))
}

#[axum::debug_handler]
pub async fn get_automation_status(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.automation_status().await?))
}

#[axum::debug_handler]
pub async fn toggle_automation(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ToggleAutomationQuery>,
) -> Result<Json<Value>, AppError> {
    info!("Toggling automation to {}", query.enable);
    let service = CommunicationConfigService::new(&config);
    Ok(Json(service.toggle_automation(query.enable).await?))
}

// Delivery analytics

#[axum::debug_handler]
pub async fn analytics_overview(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<AnalyticsPeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DeliveryAnalyticsService::new(&config);
    Ok(Json(service.overview(query.date_from, query.date_to).await?))
}

#[axum::debug_handler]
pub async fn analytics_channels(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<AnalyticsPeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DeliveryAnalyticsService::new(&config);
    Ok(Json(service.channels(query.date_from, query.date_to).await?))
}

#[axum::debug_handler]
pub async fn analytics_templates(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<AnalyticsPeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DeliveryAnalyticsService::new(&config);
    Ok(Json(
        service
            .template_performance(query.date_from, query.date_to, query.limit.unwrap_or(20))
            .await?,
    ))
}

#[axum::debug_handler]
pub async fn analytics_trends(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<AnalyticsPeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DeliveryAnalyticsService::new(&config);
    Ok(Json(service.trends(query.date_from, query.date_to).await?))
}

#[axum::debug_handler]
pub async fn analytics_summary(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = DeliveryAnalyticsService::new(&config);
    Ok(Json(service.summary().await?))
}
