//! HTTP inventory gateway against a throwaway axum server.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use domain::{LineItem, Order, OrderId, OrderStatus, ProductId};
use history::InMemoryHistoryStore;
use lifecycle::services::CheckInventoryRequest;
use lifecycle::{
    AcceptingProcessor, HttpInventoryGateway, InventoryError, InventoryGateway, LifecycleHost,
    LifecycleSignal, OrderActivities,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use serde_json::json;

/// The fake service answers according to the requested quantity.
async fn check(Json(request): Json<CheckInventoryRequest>) -> Response {
    match request.quantity {
        1 => Json(json!({ "available": true })).into_response(),
        2 => Json(json!({ "available": false, "message": "out of stock" })).into_response(),
        3 => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "unknown product" })),
        )
            .into_response(),
        4 => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        5 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        6 => StatusCode::IM_A_TEAPOT.into_response(),
        7 => StatusCode::BAD_REQUEST.into_response(),
        _ => (StatusCode::OK, "not json").into_response(),
    }
}

async fn spawn_inventory_service() -> String {
    let app = Router::new().route("/inventory/check", post(check));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

async fn gateway() -> HttpInventoryGateway {
    let base_url = spawn_inventory_service().await;
    HttpInventoryGateway::with_timeout(&base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_available_and_unavailable_answers() {
    let gateway = gateway().await;
    let product = ProductId::new();

    let available = gateway.check_availability(product, 1).await.unwrap();
    assert!(available.available);
    assert!(available.message.is_none());

    let unavailable = gateway.check_availability(product, 2).await.unwrap();
    assert!(!unavailable.available);
    assert_eq!(unavailable.message.as_deref(), Some("out of stock"));
}

#[tokio::test]
async fn test_bad_request_is_permanent() {
    let gateway = gateway().await;

    let err = gateway
        .check_availability(ProductId::new(), 3)
        .await
        .unwrap_err();
    assert_eq!(err, InventoryError::InvalidRequest("unknown product".into()));
    assert!(!err.is_retryable());

    let err = gateway
        .check_availability(ProductId::new(), 7)
        .await
        .unwrap_err();
    assert_eq!(err, InventoryError::InvalidRequest("invalid request".into()));
}

#[tokio::test]
async fn test_server_errors_are_retryable() {
    let gateway = gateway().await;

    for (quantity, status) in [(4, 503), (5, 500)] {
        let err = gateway
            .check_availability(ProductId::new(), quantity)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::Unavailable { status });
        assert!(err.is_retryable());
    }
}

#[tokio::test]
async fn test_unexpected_answers() {
    let gateway = gateway().await;

    let err = gateway
        .check_availability(ProductId::new(), 6)
        .await
        .unwrap_err();
    assert_eq!(err, InventoryError::UnexpectedStatus(418));

    let err = gateway
        .check_availability(ProductId::new(), 8)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Decode(_)));
}

#[test]
fn test_undecodable_answer_is_counted() {
    // The server lives on its own runtime; the check runs on a current-thread
    // runtime so the local recorder sees every metric it emits.
    let server = tokio::runtime::Runtime::new().unwrap();
    let base_url = server.block_on(spawn_inventory_service());
    let client = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let gateway = HttpInventoryGateway::new(&base_url).unwrap();

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let result = metrics::with_local_recorder(&recorder, || {
        client.block_on(gateway.check_availability(ProductId::new(), 8))
    });

    assert!(matches!(result, Err(InventoryError::Decode(_))));
    assert!(
        handle
            .render()
            .contains(r#"inventory_checks_total{outcome="retryable_error"} 1"#)
    );
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway =
        HttpInventoryGateway::with_timeout(&format!("http://{addr}"), Duration::from_secs(2))
            .unwrap();
    let err = gateway
        .check_availability(ProductId::new(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_lifecycle_validates_over_http() {
    let gateway = gateway().await;
    let activities =
        OrderActivities::with_gateway(Arc::new(gateway), Arc::new(AcceptingProcessor::default()));
    let host = LifecycleHost::new(InMemoryHistoryStore::new(), activities, "order-lifecycle");

    let order = Order::new(
        OrderId::new(),
        vec![LineItem::new(ProductId::new(), 1, Decimal::new(12345, 2))],
    );
    let handle = host.start(order).await.unwrap();

    let mut placed = false;
    for _ in 0..500 {
        if handle.status().await.unwrap() == Some(OrderStatus::Placed) {
            placed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(placed, "order never reached PLACED");

    handle.signal(LifecycleSignal::Cancel).await.unwrap();
    assert_eq!(handle.result().await.unwrap().status, OrderStatus::Cancelled);
}
