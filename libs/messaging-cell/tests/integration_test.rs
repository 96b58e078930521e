use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use messaging_cell::router::{create_conversation_router, create_whatsapp_router};
use shared_config::AppConfig;

fn test_config(data_uri: &str, whatsapp_uri: &str) -> AppConfig {
    AppConfig {
        data_api_url: data_uri.to_string(),
        data_api_key: "test-key".to_string(),
        data_source: "test-cluster".to_string(),
        database_name: "test-db".to_string(),
        whatsapp_service_url: whatsapp_uri.to_string(),
        verification_base_url: "https://verificacion.example".to_string(),
        port: 8000,
    }
}

const CONV_ID: &str = "8d7c6b5a-4e3f-4a2b-9c1d-0e9f8a7b6c5d";

fn conversation_doc(status: &str) -> Value {
    json!({
        "_id": CONV_ID,
        "patient_id": null,
        "whatsapp_number": "+34664123456",
        "status": status,
        "last_message_at": "2026-08-25T10:00:00Z",
        "created_at": "2026-08-25T10:00:00Z"
    })
}

fn message_doc(content: &str) -> Value {
    json!({
        "_id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
        "conversation_id": CONV_ID,
        "type": "text",
        "content": content,
        "sender": "patient",
        "sent_at": "2026-08-25T10:05:00Z"
    })
}

#[tokio::test]
async fn conversation_status_outside_the_palette_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri(), "http://localhost:3001");
    let app = create_conversation_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}/status?status=purple", CONV_ID))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conversation_status_update_round_trips() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({ "collection": "conversations" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matchedCount": 1 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "conversations" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "document": conversation_doc("green") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), "http://localhost:3001");
    let app = create_conversation_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}/status?status=green", CONV_ID))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "green");
}

#[tokio::test]
async fn missing_conversation_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "document": null })))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), "http://localhost:3001");
    let app = create_conversation_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}", CONV_ID))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_opens_a_gray_conversation_for_a_new_number() {
    let mock_server = MockServer::start().await;

    // Number lookup misses, so the webhook opens a fresh conversation
    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "conversations" })))
        .and(body_string_contains("whatsapp_number"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "document": null })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "conversations" })))
        .and(body_string_contains("\"status\":\"gray\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "insertedId": CONV_ID })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "conversations" })))
        .and(body_string_contains("_id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "document": conversation_doc("gray") })),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "messages" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "insertedId": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .and(body_partial_json(json!({ "collection": "conversations" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matchedCount": 1 })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "messages" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": message_doc("Hola") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri(), "http://localhost:3001");
    let app = create_whatsapp_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "from": "+34664123456", "message": "Hola" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["conversation_id"], CONV_ID);
}

#[tokio::test]
async fn webhook_without_sender_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri(), "http://localhost:3001");
    let app = create_whatsapp_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "message": "Hola" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn whatsapp_status_proxies_the_bridge() {
    let data_server = MockServer::start().await;
    let bridge = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "connected": true, "state": "open" })),
        )
        .mount(&bridge)
        .await;

    let config = test_config(&data_server.uri(), &bridge.uri());
    let app = create_whatsapp_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("GET")
        .uri("/status")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["connected"], true);
}

#[tokio::test]
async fn bridge_rejection_surfaces_as_bad_gateway() {
    let data_server = MockServer::start().await;
    let bridge = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bridge)
        .await;

    let config = test_config(&data_server.uri(), &bridge.uri());
    let app = create_whatsapp_router(Arc::new(config.clone()));

    let request = Request::builder()
        .method("POST")
        .uri("/send-message")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "to": "+34664123456", "message": "Hola" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
