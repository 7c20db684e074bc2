//! HTTP host for order lifecycles.
//!
//! Exposes submission, signals, the status query and results over REST,
//! with structured logging (tracing) and Prometheus metrics. The
//! `order-worker` binary serves this router; `order-client` talks to it.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use history::HistoryStore;
use lifecycle::{
    AcceptingProcessor, HttpInventoryGateway, InMemoryInventoryGateway, InventoryGateway,
    LifecycleHost, OrderActivities, OrderProcessor, UnimplementedProcessor,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Stock given to every product by the in-memory inventory gateway.
const DEMO_STOCK: i32 = 1_000_000;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: HistoryStore + Clone + 'static>(
    host: LifecycleHost<S>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let state = Arc::new(AppState { host });

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/orders", post(routes::orders::submit::<S>))
        .route(
            "/orders/{id}/signals/{signal}",
            post(routes::orders::signal::<S>),
        )
        .route("/orders/{id}/status", get(routes::orders::status::<S>))
        .route("/orders/{id}/result", get(routes::orders::result::<S>))
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds a lifecycle host over `store` from the worker configuration.
pub fn create_host<S: HistoryStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<LifecycleHost<S>, reqwest::Error> {
    let gateway: Arc<dyn InventoryGateway> = if config.inventory.is_in_memory() {
        tracing::warn!("using in-memory inventory gateway");
        Arc::new(InMemoryInventoryGateway::with_default_stock(DEMO_STOCK))
    } else {
        Arc::new(HttpInventoryGateway::with_timeout(
            &config.inventory.base_url,
            config.inventory.timeout(),
        )?)
    };

    let processor: Arc<dyn OrderProcessor> = if config.lifecycle.accept_processing {
        Arc::new(AcceptingProcessor::default())
    } else {
        Arc::new(UnimplementedProcessor)
    };

    let activities = OrderActivities::with_gateway(gateway, processor);
    Ok(LifecycleHost::new(store, activities, config.task_queue.clone())
        .with_options(config.lifecycle_options()))
}
