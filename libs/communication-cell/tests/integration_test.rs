use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use communication_cell::router::create_communication_router;
use communication_cell::services::CommunicationConfigService;
use shared_config::AppConfig;

fn test_config(uri: &str) -> AppConfig {
    AppConfig {
        data_api_url: uri.to_string(),
        data_api_key: "test-key".to_string(),
        data_source: "test-cluster".to_string(),
        database_name: "test-db".to_string(),
        whatsapp_service_url: "http://localhost:3001".to_string(),
        verification_base_url: "https://verificacion.example".to_string(),
        port: 8000,
    }
}

fn test_app(config: &AppConfig) -> Router {
    create_communication_router(Arc::new(config.clone()))
}

fn template_doc(id: &str) -> Value {
    json!({
        "_id": id,
        "name": "Recordatorio 24h",
        "type": "email",
        "category": "reminder_24h",
        "subject": "Tu cita de mañana",
        "html_content": "<p>Hola {{ patient_name }}, te esperamos el {{ appointment_date }}.</p>",
        "text_content": "Hola {{ patient_name }}, te esperamos el {{ appointment_date }}.",
        "variables": ["patient_name", "appointment_date"],
        "send_timing": { "hours_before": 24, "days_after": null, "timezone": "Europe/Madrid" },
        "tracking_enabled": true,
        "is_active": true,
        "created_at": "2026-08-01T09:00:00Z",
        "updated_at": "2026-08-01T09:00:00Z",
        "created_by": "admin"
    })
}

fn campaign_doc(id: &str, status: &str) -> Value {
    json!({
        "_id": id,
        "name": "Campaña revisión anual",
        "type": "reminder",
        "target_criteria": {
            "patient_segments": null,
            "treatment_types": null,
            "doctor": null,
            "custom_filters": null
        },
        "channels": [{
            "type": "email",
            "template_id": "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d",
            "send_at": "2026-09-01T10:00:00Z",
            "delay_hours": null
        }],
        "status": status,
        "recipients_count": 0,
        "sent_count": 0,
        "delivered_count": 0,
        "scheduled_at": null,
        "completed_at": null,
        "created_at": "2026-08-20T09:00:00Z",
        "updated_at": "2026-08-20T09:00:00Z",
        "created_by": "admin"
    })
}

#[tokio::test]
async fn template_preview_renders_placeholders() {
    let mock_server = MockServer::start().await;
    let id = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "communication_templates" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": template_doc(id) })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/templates/{}/preview", id))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "patient_name": "Ana", "appointment_date": "26/08/2026" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body["text_content"],
        "Hola Ana, te esperamos el 26/08/2026."
    );
    assert_eq!(body["subject"], "Tu cita de mañana");
}

#[tokio::test]
async fn preferences_fall_back_to_defaults_when_never_saved() {
    let mock_server = MockServer::start().await;
    let patient_id = "3f9c2b1a-5d4e-4f6a-8b7c-1d2e3f4a5b6c";

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "patients" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document": { "_id": patient_id, "name": "Ana García" }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({
            "collection": "patient_communication_preferences"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "document": null })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/preferences/{}", patient_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["patient_id"], patient_id);
    assert_eq!(body["preferred_channels"]["email"], true);
    assert_eq!(body["communication_types"]["promotional_offers"], false);
    assert_eq!(body["frequency_limits"]["max_sms_per_week"], 3);
    assert_eq!(body["updated_by"], "default");
}

#[tokio::test]
async fn preferences_for_unknown_patient_are_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "patients" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "document": null })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/preferences/3f9c2b1a-5d4e-4f6a-8b7c-1d2e3f4a5b6c")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn draft_campaign_cannot_be_cancelled() {
    let mock_server = MockServer::start().await;
    let id = "4b5c6d7e-8f9a-4b1c-9d2e-3f4a5b6c7d8e";

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "communication_campaigns" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": campaign_doc(id, "draft") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/campaigns/{}/cancel", id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn email_template_without_subject_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri("/templates")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": "Recordatorio 24h",
                "type": "email",
                "category": "reminder_24h",
                "subject": null,
                "html_content": "<p>Hola {{ patient_name }}</p>",
                "text_content": "Hola {{ patient_name }}",
                "send_timing": { "hours_before": 24, "days_after": null }
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn automation_defaults_on_and_status_agrees_with_worker_gate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "communication_config" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "document": null })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());

    let gate = CommunicationConfigService::new(&config)
        .automation_enabled()
        .await
        .unwrap();
    assert!(gate);

    let app = test_app(&config);
    let request = Request::builder()
        .method("GET")
        .uri("/config/automation-status")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["automation_enabled"], true);
    assert_eq!(body["scheduler_running"], gate);
}

#[tokio::test]
async fn automation_status_reports_flag_from_config_document() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "communication_config" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document": { "enable_auto_reminders": false }
        })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/config/automation-status")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["automation_enabled"], false);
    assert_eq!(body["scheduler_running"], false);
}
