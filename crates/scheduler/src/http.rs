use axum::routing::get;
use axum::{Json, Router};

/// The Scheduler owns no stream or store, so its HTTP surface is just a
/// liveness probe (§6) — there is no drain predicate or stage metrics to
/// expose for a component with no consumer group of its own. Unlike the
/// other four services, the Scheduler's health route is bare `/health`,
/// not `/<name>/health`.
pub fn build_router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}
