use std::time::Duration;

use ravedigest_core::config::{Config, ServiceUrls};
use ravedigest_core::retry::{with_backoff, RetryPolicy};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    is_idle: bool,
}

/// Drives one full daily cycle (§4.7): trigger Collector, wait for the
/// Analyzer to drain, trigger Composer, wait for the Publisher to drain. Any
/// step that exhausts its retries/attempts aborts the run — the next attempt
/// is the following day's scheduled fire, never a same-day retry loop.
pub struct DailyJob {
    client: reqwest::Client,
    services: ServiceUrls,
    trigger_retries: RetryPolicy,
    drain_poll_interval: Duration,
    drain_max_attempts: u32,
}

impl DailyJob {
    pub fn new(config: &Config) -> Self {
        // Fixed-delay retry (not exponential) per §4.7 step 1: backoff_factor
        // of 1.0 makes `with_backoff` retry at a constant interval.
        let trigger_retries = RetryPolicy::new(
            config.scheduler.trigger_max_retries,
            config.scheduler.trigger_retry_delay_secs as f64,
            1.0,
        );
        Self {
            client: reqwest::Client::new(),
            services: config.services.clone(),
            trigger_retries,
            drain_poll_interval: Duration::from_secs(config.scheduler.drain_poll_interval_secs),
            drain_max_attempts: config.scheduler.drain_max_attempts,
        }
    }

    pub async fn run_once(&self) {
        tracing::info!("daily job starting");

        if let Err(e) = self.trigger_collector().await {
            tracing::error!(error = %e, "collector trigger failed, deferring to next day");
            return;
        }

        if !self.wait_for_drain(&format!("{}/analyzer/status", self.services.analyzer_url)).await {
            tracing::error!("analyzer did not drain in time, deferring to next day");
            return;
        }

        if let Err(e) = self.trigger_composer().await {
            tracing::error!(error = %e, "composer trigger failed, deferring to next day");
            return;
        }

        if !self.wait_for_drain(&format!("{}/notion/status", self.services.notion_worker_url)).await {
            tracing::error!("publisher did not drain in time, deferring to next day");
            return;
        }

        tracing::info!("daily job completed");
    }

    async fn trigger_collector(&self) -> anyhow::Result<()> {
        let url = format!("{}/collect/rss", self.services.collector_url);
        let client = self.client.clone();
        with_backoff(&self.trigger_retries, move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url).send().await?.error_for_status().map(|_| ()) }
        })
        .await
        .map_err(anyhow::Error::from)
    }

    async fn trigger_composer(&self) -> anyhow::Result<()> {
        let url = format!("{}/compose", self.services.composer_url);
        let client = self.client.clone();
        with_backoff(&self.trigger_retries, move || {
            let client = client.clone();
            let url = url.clone();
            async move {
                let response = client.post(&url).send().await?;
                // 204 (nothing to compose) is a success, not a retry trigger.
                if response.status().is_success() {
                    Ok(())
                } else {
                    response.error_for_status().map(|_| ())
                }
            }
        })
        .await
        .map_err(anyhow::Error::from)
    }

    /// Polls `status_url` every `drain_poll_interval` up to `drain_max_attempts`
    /// times, returning `true` once `is_idle` is reported (§4.7 step 2/4).
    async fn wait_for_drain(&self, status_url: &str) -> bool {
        for attempt in 0..self.drain_max_attempts {
            match self.client.get(status_url).send().await {
                // §4.7: "if stream does not exist, treat as drained" — the
                // status endpoint 404s when the consumer group is missing
                // (§6, §7); that's this poll's own interpretation of the 404,
                // not something the endpoint itself collapses into a 200.
                Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => return true,
                Ok(response) => match response.json::<StatusResponse>().await {
                    Ok(status) if status.is_idle => return true,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, attempt, "failed to parse drain status response"),
                },
                Err(e) => tracing::warn!(error = %e, attempt, status_url, "failed to poll drain status"),
            }
            tokio::time::sleep(self.drain_poll_interval).await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;

    fn test_job(services: ServiceUrls) -> DailyJob {
        DailyJob {
            client: reqwest::Client::new(),
            services,
            trigger_retries: RetryPolicy::new(2, 0.001, 1.0),
            drain_poll_interval: Duration::from_millis(5),
            drain_max_attempts: 4,
        }
    }

    /// Binds an axum router to an ephemeral localhost port and returns its
    /// base URL; the server runs for the lifetime of the test process.
    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    async fn idle_status() -> Json<serde_json::Value> {
        Json(serde_json::json!({ "is_idle": true }))
    }

    #[tokio::test]
    async fn full_day_runs_through_every_step_when_everything_drains_immediately() {
        let collector_hits = Arc::new(AtomicU32::new(0));
        let composer_hits = Arc::new(AtomicU32::new(0));

        let collector_url = spawn({
            let hits = collector_hits.clone();
            Router::new().route(
                "/collect/rss",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({ "ok": true }))
                    }
                }),
            )
        })
        .await;
        let analyzer_url = spawn(Router::new().route("/analyzer/status", get(idle_status))).await;
        let composer_url = spawn({
            let hits = composer_hits.clone();
            Router::new().route(
                "/compose",
                post(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        axum::http::StatusCode::NO_CONTENT
                    }
                }),
            )
        })
        .await;
        let notion_url = spawn(Router::new().route("/notion/status", get(idle_status))).await;

        let job = test_job(ServiceUrls {
            collector_url,
            composer_url,
            analyzer_url,
            notion_worker_url: notion_url,
        });

        job.run_once().await;

        assert_eq!(collector_hits.load(Ordering::SeqCst), 1);
        assert_eq!(composer_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_after_collector_trigger_exhausts_retries() {
        let composer_hits = Arc::new(AtomicU32::new(0));

        let collector_url = spawn(Router::new().route(
            "/collect/rss",
            get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let analyzer_url = spawn(Router::new().route("/analyzer/status", get(idle_status))).await;
        let composer_url = spawn({
            let hits = composer_hits.clone();
            Router::new().route(
                "/compose",
                post(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        axum::http::StatusCode::NO_CONTENT
                    }
                }),
            )
        })
        .await;
        let notion_url = spawn(Router::new().route("/notion/status", get(idle_status))).await;

        let job = test_job(ServiceUrls {
            collector_url,
            composer_url,
            analyzer_url,
            notion_worker_url: notion_url,
        });

        job.run_once().await;

        assert_eq!(composer_hits.load(Ordering::SeqCst), 0, "composer must not be triggered once collector fails");
    }

    #[tokio::test]
    async fn stops_when_analyzer_never_drains() {
        let composer_hits = Arc::new(AtomicU32::new(0));
        let busy_polls = Arc::new(AtomicU32::new(0));

        let collector_url = spawn(Router::new().route("/collect/rss", get(|| async { Json(serde_json::json!({})) }))).await;
        let analyzer_url = spawn({
            let polls = busy_polls.clone();
            Router::new().route(
                "/analyzer/status",
                get(move || {
                    let polls = polls.clone();
                    async move {
                        polls.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({ "is_idle": false }))
                    }
                }),
            )
        })
        .await;
        let composer_url = spawn({
            let hits = composer_hits.clone();
            Router::new().route(
                "/compose",
                post(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        axum::http::StatusCode::NO_CONTENT
                    }
                }),
            )
        })
        .await;
        let notion_url = spawn(Router::new().route("/notion/status", get(idle_status))).await;

        let job = test_job(ServiceUrls {
            collector_url,
            composer_url,
            analyzer_url,
            notion_worker_url: notion_url,
        });

        job.run_once().await;

        assert_eq!(busy_polls.load(Ordering::SeqCst), 4, "must poll drain_max_attempts times before giving up");
        assert_eq!(composer_hits.load(Ordering::SeqCst), 0, "composer must not fire once the analyzer never drains");
    }
}
