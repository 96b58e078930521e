use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Datelike;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use invoice_cell::router::create_invoice_router;
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
    create_invoice_router(Arc::new(config.clone()))
}

fn invoice_doc(id: &str, status: &str) -> Value {
    json!({
        "_id": id,
        "number": "F2026-A0001",
        "series": "A",
        "issue_date": "2026-08-25T10:00:00Z",
        "due_date": "2026-09-24T10:00:00Z",
        "emitter": {
            "nif": "B12345678",
            "legal_name": "Clínica Dentaria SL",
            "address": "Calle Mayor 1",
            "municipality": "Madrid",
            "postal_code": "28001",
            "province": "Madrid",
            "commercial_registry": null,
            "email": "facturacion@dentaria.example"
        },
        "receiver": {
            "nif": null,
            "full_name": "Ana García",
            "address": null,
            "email": "ana@example.com",
            "phone": null
        },
        "lines": [{
            "concept": "Limpieza dental",
            "quantity": 1.0,
            "unit_price": 60.0,
            "discount_pct": 0.0,
            "vat_rate": "21",
            "taxable_base": 60.0,
            "vat_amount": 12.6,
            "line_total": 72.6
        }],
        "subtotal": 60.0,
        "total_vat": 12.6,
        "total": 72.6,
        "invoice_type": "F1",
        "status": status,
        "tax_submitted_at": null,
        "tax_response": null,
        "qr_data": "{\"version\":\"1.0\"}",
        "verification_hash": "0f3a6c1d9e2b4a8f7c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b9c8d7e6f5a4b",
        "appointment_id": null,
        "notes": null,
        "payment_method": "transferencia",
        "created_at": "2026-08-25T10:00:00Z",
        "updated_at": "2026-08-25T10:00:00Z"
    })
}

fn create_request_body() -> Value {
    json!({
        "emitter": {
            "nif": "B12345678",
            "legal_name": "Clínica Dentaria SL",
            "address": "Calle Mayor 1",
            "municipality": "Madrid",
            "postal_code": "28001",
            "province": "Madrid",
            "email": "facturacion@dentaria.example"
        },
        "receiver": {
            "full_name": "Ana García",
            "email": "ana@example.com"
        },
        "lines": [{ "concept": "Limpieza dental", "unit_price": 60.0 }]
    })
}

#[tokio::test]
async fn create_invoice_assigns_number_and_returns_created() {
    let mock_server = MockServer::start().await;
    let id = "7e2a1f44-9c3b-4d6e-8a1f-2b3c4d5e6f70";

    // Sequence lookup finds no prior invoices in the series
    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({ "collection": "facturas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documents": [] })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({ "collection": "facturas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "insertedId": id })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "facturas" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": invoice_doc(id, "draft") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(create_request_body().to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["number"], "F2026-A0001");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["total"], 72.6);
}

#[tokio::test]
async fn numbering_survives_a_five_digit_sequence() {
    let mock_server = MockServer::start().await;
    let id = "7e2a1f44-9c3b-4d6e-8a1f-2b3c4d5e6f70";
    let year = chrono::Utc::now().year();

    // A9999 sorts above A10000 as a string; the max must still be 10000
    Mock::given(method("POST"))
        .and(path("/action/find"))
        .and(body_partial_json(json!({ "collection": "facturas" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                { "number": format!("F{}-A9999", year) },
                { "number": format!("F{}-A10000", year) }
            ]
        })))
        .mount(&mock_server)
        .await;

    // Only matches when the computed number is the next one after 10000
    Mock::given(method("POST"))
        .and(path("/action/insertOne"))
        .and(body_partial_json(json!({
            "collection": "facturas",
            "document": { "number": format!("F{}-A10001", year) }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "insertedId": id })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .and(body_partial_json(json!({ "collection": "facturas" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": invoice_doc(id, "draft") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(create_request_body().to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn create_invoice_without_lines_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let mut body = create_request_body();
    body["lines"] = json!([]);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_invoice_id_is_a_bad_request() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri("/not-a-uuid")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_invoice_is_not_found() {
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
        .uri("/7e2a1f44-9c3b-4d6e-8a1f-2b3c4d5e6f70")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn issued_invoice_cannot_be_edited() {
    let mock_server = MockServer::start().await;
    let id = "7e2a1f44-9c3b-4d6e-8a1f-2b3c4d5e6f70";

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "document": invoice_doc(id, "issued") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("PUT")
        .uri(&format!("/{}", id))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "notes": "late edit" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submitting_a_draft_marks_it_issued() {
    let mock_server = MockServer::start().await;
    let id = "7e2a1f44-9c3b-4d6e-8a1f-2b3c4d5e6f70";

    // First fetch sees the draft, the re-fetch after update sees it issued
    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": invoice_doc(id, "draft") })),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/updateOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matchedCount": 1 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "document": invoice_doc(id, "issued") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/submit", id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "issued");
}

#[tokio::test]
async fn qr_payload_is_exposed_for_existing_invoices() {
    let mock_server = MockServer::start().await;
    let id = "7e2a1f44-9c3b-4d6e-8a1f-2b3c4d5e6f70";

    Mock::given(method("POST"))
        .and(path("/action/findOne"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "document": invoice_doc(id, "draft") })),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let app = test_app(&config);

    let request = Request::builder()
        .method("GET")
        .uri(&format!("/{}/qr", id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
