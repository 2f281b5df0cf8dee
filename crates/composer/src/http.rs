use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use ravedigest_worker::{run_check, HealthResponse, StageMetrics};
use serde::Serialize;

use crate::service::ComposerService;

pub struct AppState {
    pub service: Arc<ComposerService>,
    pub metrics: Arc<StageMetrics>,
}

/// Builds the Composer's HTTP surface: shared health/live/ready/metrics plus
/// `POST /compose`, the Scheduler's direct trigger (§4.5, §4.7 step 3).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/composer/health", get(health))
        .route("/composer/health/live", get(health_live))
        .route("/composer/health/ready", get(health_ready))
        .route("/composer/metrics", get(metrics))
        .route("/compose", post(compose))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let bus = state.service.bus().clone();
    let store = state.service.store().clone();
    let checks = vec![
        run_check("bus", || async move { bus.ping().await }).await,
        run_check("store", || async move { store.ping().await }).await,
    ];
    Json(HealthResponse::new("composer", checks))
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
    state.metrics.render_prometheus("composer")
}

#[derive(Debug, Serialize)]
struct DigestOut {
    digest_id: String,
    title: String,
    summary: String,
    url: String,
    source: String,
}

async fn compose(State(state): State<Arc<AppState>>) -> axum::response::Response {
    use axum::response::IntoResponse;
    match state.service.compose().await {
        Ok(Some(digest)) => {
            state.metrics.record_success();
            Json(DigestOut {
                digest_id: digest.id.to_string(),
                title: digest.title,
                summary: digest.summary,
                url: digest.url,
                source: digest.source,
            })
            .into_response()
        }
        Ok(None) => axum::http::StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            state.metrics.record_failure();
            tracing::error!(error = %e, "compose request failed");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
