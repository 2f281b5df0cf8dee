use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ravedigest_bus::Bus;
use ravedigest_store::Store;
use ravedigest_worker::{run_check, HealthResponse, StageMetrics};
use serde::Serialize;

pub struct AppState {
    pub bus: Arc<dyn Bus>,
    pub store: Arc<dyn Store>,
    pub metrics: Arc<StageMetrics>,
    pub stream: String,
    pub group: String,
}

/// Builds the Publisher's HTTP surface: shared health/live/ready/metrics plus
/// `GET /notion/status`, the drain-predicate endpoint the Scheduler polls
/// after triggering the Composer (§4.7 step 4).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/publisher/health", get(health))
        .route("/publisher/health/live", get(health_live))
        .route("/publisher/health/ready", get(health_ready))
        .route("/publisher/metrics", get(metrics))
        .route("/notion/status", get(status))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let bus = state.bus.clone();
    let store = state.store.clone();
    let checks = vec![
        run_check("bus", || async move { bus.ping().await }).await,
        run_check("store", || async move { store.ping().await }).await,
    ];
    Json(HealthResponse::new("publisher", checks))
}

async fn health_live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}

async fn health_ready(State(state): State<Arc<AppState>>) -> axum::http::StatusCode {
    let response = health(State(state)).await;
    if response.0.is_healthy() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render_prometheus("publisher")
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    is_idle: bool,
    last_generated_id: Option<String>,
    last_delivered_id: Option<String>,
    pending_messages: u64,
}

/// Drain predicate: idle iff the group's last-delivered id has caught up to
/// the stream's high-water mark with nothing pending. A missing group is a
/// 404 (§6, §7) — "treat as drained" is the Scheduler's own interpretation
/// of that 404 on the poll side, not this endpoint's job.
async fn status(State(state): State<Arc<AppState>>) -> (axum::http::StatusCode, Json<StatusResponse>) {
    match state.bus.group_info(&state.stream, &state.group).await {
        Ok(Some(info)) => (
            axum::http::StatusCode::OK,
            Json(StatusResponse {
                is_idle: info.is_drained(),
                last_generated_id: Some(info.last_generated_id),
                last_delivered_id: Some(info.last_delivered_id),
                pending_messages: info.pending,
            }),
        ),
        Ok(None) => (
            axum::http::StatusCode::NOT_FOUND,
            Json(StatusResponse {
                is_idle: false,
                last_generated_id: None,
                last_delivered_id: None,
                pending_messages: 0,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to read consumer group info");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse {
                    is_idle: false,
                    last_generated_id: None,
                    last_delivered_id: None,
                    pending_messages: 0,
                }),
            )
        }
    }
}
