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

use patient_cell::router::create_patient_router;
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
    create_patient_router(Arc::new(config.clone()))
}

fn patient_doc(id: &str) -> Value {
    json!({
        "_id": id,
        "name": "Ana García",
        "phone": "+34664123456",
        "email": "ana@example.com",
        "notes": null,
        "whatsapp_registered": true,
        "created_at": "2026-08-20T09:00:00Z",
        "updated_at": "2026-08-20T09:00:00Z"
    })
}

#[tokio::test]
async fn create_patient_returns_created_with_stored_record() {
    let mock_server = MockServer::start().await;
    let id = "3f9c2b1a-5d4e-4f6a-8b7c-1d2e3f4a5b6c";

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "patients" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "insertedId": id })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "patients" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": patient_doc(id) })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "name": "Ana García",
                "phone": "+34664123456",
                "email": "ana@example.com",
                "whatsapp_registered": true
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["name"], "Ana García");
    assert_eq!(body["whatsapp_registered"], true);
}

#[tokio::test]
async fn create_patient_with_short_phone_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "name": "Ana García", "phone": "12345" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_patient_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "document": null })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/3f9c2b1a-5d4e-4f6a-8b7c-1d2e3f4a5b6c")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_patient_id_is_a_bad_request() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/12345")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_patients_passes_search_filter_through() {
    let mock_server = MockServer::start().await;
    let id = "3f9c2b1a-5d4e-4f6a-8b7c-1d2e3f4a5b6c";

    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({
            "collection": "patients",
            "filter": { "$or": [{ "name": { "$regex": "ana" } }] }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "documents": [patient_doc(id)] })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/?search=ana")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));
}

#[tokio::test]
async fn patient_history_combines_record_and_appointments() {
    let mock_server = MockServer::start().await;
    let id = "3f9c2b1a-5d4e-4f6a-8b7c-1d2e3f4a5b6c";

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "patients" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": patient_doc(id) })),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({ "collection": "appointments" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{ "_id": "a1", "patient_id": id, "date": "2026-08-24" }]
        })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}/history", id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["patient"]["name"], "Ana García");
    assert_eq!(body["appointments"].as_array().map(|a| a.len()), Some(1));
}
