use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use shared_config::AppConfig;

use crate::handlers::{
    analytics_channels, analytics_overview, analytics_summary, analytics_templates,
    analytics_trends, bulk_update_preferences, cancel_campaign, create_campaign, create_template,
    delete_campaign, delete_template, get_automation_status, get_campaign, get_preferences,
    get_sms_config, get_smtp_config, get_template, get_whatsapp_config, list_campaigns,
    list_templates, preview_template, send_campaign, test_email, test_sms, toggle_automation,
    update_campaign, update_preferences, update_sms_config, update_smtp_config, update_template,
};

pub fn create_communication_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/templates/{id}/preview", post(preview_template))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/{id}",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/{id}/send", post(send_campaign))
        .route("/campaigns/{id}/cancel", post(cancel_campaign))
        .route("/preferences/bulk-update", post(bulk_update_preferences))
        .route(
            "/preferences/{patient_id}",
            get(get_preferences).put(update_preferences),
        )
        .route("/config/smtp", get(get_smtp_config).put(update_smtp_config))
        .route("/config/sms", get(get_sms_config).put(update_sms_config))
        .route("/config/whatsapp", get(get_whatsapp_config))
        .route("/config/test-email", post(test_email))
        .route("/config/test-sms", post(test_sms))
        .route("/config/automation-status", get(get_automation_status))
        .route("/config/toggle-automation", post(toggle_automation))
        .route("/analytics/overview", get(analytics_overview))
        .route("/analytics/channels", get(analytics_channels))
        .route("/analytics/templates", get(analytics_templates))
        .route("/analytics/trends", get(analytics_trends))
        .route("/analytics/performance", get(analytics_summary))
        .with_state(config)
}
