//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use history::HistoryStore;
use serde::Serialize;

use super::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub task_queue: String,
    pub running_instances: usize,
}

/// GET /health: reports the task queue and how many instances are live.
pub async fn check<S: HistoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        task_queue: state.host.task_queue().to_string(),
        running_instances: state.host.running_count().await,
    })
}
