//! Integration tests for the order lifecycle HTTP API.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use history::InMemoryHistoryStore;
use lifecycle::{
    AcceptingProcessor, InMemoryInventoryGateway, LifecycleHost, OrderActivities,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

const ORDER_ID: &str = "8c727b70-cfcb-4674-8bcd-78e66e32f723";
const PRODUCT_ID: &str = "ba320a5d-62ed-46d0-b491-084514598721";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let activities = OrderActivities::with_gateway(
        Arc::new(InMemoryInventoryGateway::with_default_stock(100)),
        Arc::new(AcceptingProcessor::default()),
    );
    let host = LifecycleHost::new(InMemoryHistoryStore::new(), activities, "order-lifecycle");
    api::create_app(host, get_metrics_handle())
}

fn sample_order() -> serde_json::Value {
    serde_json::json!({
        "id": ORDER_ID,
        "line_items": [{
            "product_id": PRODUCT_ID,
            "quantity": 1,
            "price_per_item": "123.45"
        }]
    })
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn submit(app: &axum::Router) -> String {
    let (status, json) = send(app, "POST", "/orders", Some(sample_order())).await;
    assert_eq!(status, StatusCode::CREATED);
    json["instance_id"].as_str().unwrap().to_string()
}

async fn wait_for_status(app: &axum::Router, id: &str, expected: &str) {
    for _ in 0..500 {
        let (_, json) = send(app, "GET", &format!("/orders/{id}/status"), None).await;
        if json["status"] == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("order {id} never reached {expected}");
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["task_queue"], "order-lifecycle");
}

#[tokio::test]
async fn test_submit_returns_instance_id() {
    let app = setup();

    let id = submit(&app).await;
    assert!(id.starts_with("order-"));

    wait_for_status(&app, &id, "PLACED").await;
    let (status, json) = send(&app, "GET", &format!("/orders/{id}/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "GetOrderStatus");
    assert_eq!(json["instance_id"], id);
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let app = setup();
    let id = submit(&app).await;

    wait_for_status(&app, &id, "PLACED").await;
    let (status, json) = send(&app, "POST", &format!("/orders/{id}/signals/pick"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["channel"], "pickOrder");

    wait_for_status(&app, &id, "PICKED").await;
    let (status, _) = send(&app, "POST", &format!("/orders/{id}/signals/ship"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_status(&app, &id, "SHIPPED").await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{id}/signals/markOrderAsDelivered"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, json) = send(&app, "GET", &format!("/orders/{id}/result"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "COMPLETED");
    assert!(json["error"].is_null());

    let (status, json) = send(&app, "GET", &format!("/orders/{id}/history"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["closed"], true);
    assert_eq!(json["status"], "COMPLETED");
    assert_eq!(json["order"]["id"], ORDER_ID);
}

#[tokio::test]
async fn test_submit_and_wait_reports_validation_failure() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/orders?wait=true",
        Some(serde_json::json!({ "id": ORDER_ID, "line_items": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "UNABLE_TO_COMPLETE");
    assert_eq!(json["failed_step"], "validate");
    assert_eq!(json["error"], "order must have at least one item");
}

#[tokio::test]
async fn test_cancel_then_signal_is_conflict() {
    let app = setup();
    let id = submit(&app).await;

    wait_for_status(&app, &id, "PLACED").await;
    let (status, _) = send(&app, "POST", &format!("/orders/{id}/signals/cancel"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, json) = send(&app, "GET", &format!("/orders/{id}/result"), None).await;
    assert_eq!(json["status"], "CANCELLED");

    let (status, json) = send(&app, "POST", &format!("/orders/{id}/signals/pick"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already ended"));
}

#[tokio::test]
async fn test_unknown_signal_is_bad_request() {
    let app = setup();
    let id = submit(&app).await;

    let (status, json) = send(&app, "POST", &format!("/orders/{id}/signals/refund"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("refund"));
}

#[tokio::test]
async fn test_unknown_instance_is_not_found() {
    let app = setup();
    let unknown = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "GET", &format!("/orders/{unknown}/status"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", &format!("/orders/{unknown}/signals/pick"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_instance_id_is_bad_request() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/orders/not-a-uuid/status", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid ID format"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let _ = submit(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("lifecycle_started_total"));
}
