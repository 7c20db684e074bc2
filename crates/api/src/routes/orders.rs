//! Order lifecycle endpoints: submit, signal, query, result, history.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::InstanceId;
use domain::{Order, OrderStatus};
use history::HistoryStore;
use lifecycle::{GET_ORDER_STATUS_QUERY, LifecycleHost, LifecycleOutcome, LifecycleSignal};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub host: LifecycleHost<S>,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    /// Block until the lifecycle reaches a terminal status.
    #[serde(default)]
    pub wait: bool,
}

// -- Response types --

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmittedResponse {
    pub instance_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalAcceptedResponse {
    pub instance_id: String,
    pub signal: String,
    pub channel: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub instance_id: String,
    pub query: String,
    /// Null until the order is first placed.
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub instance_id: String,
    pub status: OrderStatus,
    pub failed_step: Option<String>,
    pub error: Option<String>,
}

impl OutcomeResponse {
    fn new(instance_id: InstanceId, outcome: LifecycleOutcome) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            status: outcome.status,
            failed_step: outcome.failure.as_ref().map(|f| f.step.to_string()),
            error: outcome.failure.map(|f| f.message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub instance_id: String,
    pub task_queue: String,
    pub status: Option<OrderStatus>,
    pub closed: bool,
    pub pending_signals: Vec<LifecycleSignal>,
    pub failed_attempts: u32,
    pub order: Option<Order>,
}

// -- Handlers --

/// POST /orders: start a lifecycle for the submitted order.
///
/// With `?wait=true` the response carries the terminal outcome.
#[tracing::instrument(skip(state, order), fields(order_id = %order.id))]
pub async fn submit<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<SubmitParams>,
    Json(order): Json<Order>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let handle = state.host.start(order).await?;

    if params.wait {
        let outcome = handle.result().await?;
        let body = OutcomeResponse::new(handle.id(), outcome);
        return Ok((StatusCode::OK, Json(to_json(&body)?)));
    }

    let body = SubmittedResponse {
        instance_id: handle.id().to_string(),
    };
    Ok((StatusCode::CREATED, Json(to_json(&body)?)))
}

/// POST /orders/{id}/signals/{signal}: deliver a signal.
#[tracing::instrument(skip(state))]
pub async fn signal<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, signal)): Path<(String, String)>,
) -> Result<(StatusCode, Json<SignalAcceptedResponse>), ApiError> {
    let instance_id = parse_instance_id(&id)?;
    let signal = signal
        .parse::<LifecycleSignal>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state.host.signal(instance_id, signal).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SignalAcceptedResponse {
            instance_id: instance_id.to_string(),
            signal: signal.to_string(),
            channel: signal.channel_name().to_string(),
        }),
    ))
}

/// GET /orders/{id}/status: the GetOrderStatus query.
#[tracing::instrument(skip(state))]
pub async fn status<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let instance_id = parse_instance_id(&id)?;
    let status = state.host.query_status(instance_id).await?;

    Ok(Json(StatusResponse {
        instance_id: instance_id.to_string(),
        query: GET_ORDER_STATUS_QUERY.to_string(),
        status,
    }))
}

/// GET /orders/{id}/result: block until the terminal outcome.
#[tracing::instrument(skip(state))]
pub async fn result<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let instance_id = parse_instance_id(&id)?;
    let outcome = state.host.result(instance_id).await?;
    Ok(Json(OutcomeResponse::new(instance_id, outcome)))
}

/// GET /orders/{id}/history: the instance state folded from its history.
#[tracing::instrument(skip(state))]
pub async fn history<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let instance_id = parse_instance_id(&id)?;
    let instance = state.host.describe(instance_id).await?;

    Ok(Json(HistoryResponse {
        instance_id: instance_id.to_string(),
        task_queue: instance.task_queue().to_string(),
        status: instance.status(),
        closed: instance.is_closed(),
        pending_signals: instance.pending_signals().to_vec(),
        failed_attempts: instance.failed_attempts(),
        order: instance.order().cloned(),
    }))
}

fn parse_instance_id(id: &str) -> Result<InstanceId, ApiError> {
    id.parse::<InstanceId>()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}
