use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ravedigest_worker::{run_check, HealthResponse};

use crate::service::CollectorService;

pub struct AppState {
    pub service: Arc<CollectorService>,
}

/// Builds the Collector's HTTP surface (§6): the shared health/live/ready/
/// metrics endpoints plus `GET /collect/rss`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/collector/health", get(health))
        .route("/collector/health/live", get(health_live))
        .route("/collector/health/ready", get(health_ready))
        .route("/collector/metrics", get(metrics))
        .route("/collect/rss", get(collect_rss))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let bus = state.service.bus().clone();
    let store = state.service.store().clone();
    let checks = vec![
        run_check("bus", || async move { bus.ping().await }).await,
        run_check("store", || async move { store.ping().await }).await,
    ];
    Json(HealthResponse::new("collector", checks))
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

async fn metrics() -> String {
    // The Collector has no long-running stage loop to instrument (it's
    // HTTP-triggered rather than stream-driven), so its metrics surface is
    // limited to process-level liveness; per-run counters are returned
    // directly from `/collect/rss` instead.
    "# HELP ravedigest_collector_up Whether the collector process is running.\n\
     # TYPE ravedigest_collector_up gauge\n\
     ravedigest_collector_up 1\n"
        .to_string()
}

async fn collect_rss(State(state): State<Arc<AppState>>) -> Json<crate::service::CollectionSummary> {
    Json(state.service.collect_all().await)
}
