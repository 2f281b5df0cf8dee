use std::sync::atomic::{AtomicU64, Ordering};

/// Ad-hoc Prometheus text metrics built from atomic counters — the same
/// choice as the rest of the ambient stack: a handful of counters/gauges per
/// service doesn't warrant a heavyweight metrics crate, and the teacher's
/// own status endpoints are built the same way, with hand-assembled
/// `serde_json::json!` bodies rather than a schema-generating dependency.
#[derive(Default)]
pub struct StageMetrics {
    pub messages_processed: AtomicU64,
    pub messages_failed: AtomicU64,
    pub messages_acked: AtomicU64,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.messages_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Renders the counters as Prometheus text exposition format for
    /// `GET /<name>/metrics` (§6).
    pub fn render_prometheus(&self, service: &str) -> String {
        format!(
            "# HELP ravedigest_messages_processed_total Messages handled by this stage.\n\
             # TYPE ravedigest_messages_processed_total counter\n\
             ravedigest_messages_processed_total{{service=\"{service}\"}} {processed}\n\
             # HELP ravedigest_messages_failed_total Messages left unacked after a handler error.\n\
             # TYPE ravedigest_messages_failed_total counter\n\
             ravedigest_messages_failed_total{{service=\"{service}\"}} {failed}\n\
             # HELP ravedigest_messages_acked_total Messages acknowledged after a committed effect.\n\
             # TYPE ravedigest_messages_acked_total counter\n\
             ravedigest_messages_acked_total{{service=\"{service}\"}} {acked}\n",
            processed = self.messages_processed.load(Ordering::Relaxed),
            failed = self.messages_failed.load(Ordering::Relaxed),
            acked = self.messages_acked.load(Ordering::Relaxed),
        )
    }
}
