use chrono::{DateTime, Utc};
use serde::Serialize;

/// `GET /<name>/health` response shape (§6). `healthy` iff every critical
/// dependency check passed.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub service: String,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: &'static str,
    pub message: Option<String>,
    pub response_time_ms: u128,
}

impl HealthResponse {
    pub fn new(service: impl Into<String>, checks: Vec<CheckResult>) -> Self {
        let status = if checks.iter().all(|c| c.status == "healthy") {
            "healthy"
        } else {
            "unhealthy"
        };
        Self { service: service.into(), status, timestamp: Utc::now(), checks }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Run a single dependency check, timing it and turning any error into a
/// `CheckResult` rather than propagating — health endpoints must never 500
/// just because one dependency is down.
pub async fn run_check<F, Fut, E>(name: &str, check: F) -> CheckResult
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let start = std::time::Instant::now();
    let result = check().await;
    let response_time_ms = start.elapsed().as_millis();
    match result {
        Ok(()) => CheckResult {
            name: name.to_string(),
            status: "healthy",
            message: None,
            response_time_ms,
        },
        Err(e) => CheckResult {
            name: name.to_string(),
            status: "unhealthy",
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_healthy_checks_yield_healthy_overall() {
        let check = run_check("store", || async { Ok::<(), &str>(()) }).await;
        let response = HealthResponse::new("collector", vec![check]);
        assert!(response.is_healthy());
    }

    #[tokio::test]
    async fn one_unhealthy_check_yields_unhealthy_overall() {
        let ok = run_check("store", || async { Ok::<(), &str>(()) }).await;
        let bad = run_check("bus", || async { Err::<(), _>("connection refused") }).await;
        let response = HealthResponse::new("collector", vec![ok, bad]);
        assert!(!response.is_healthy());
        assert_eq!(response.checks[1].message.as_deref(), Some("connection refused"));
    }
}
