use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ravedigest_bus::{Bus, StreamEntry};
use tokio_util::sync::CancellationToken;

use crate::metrics::StageMetrics;

/// Outcome of a handler invocation (§4.2, §7). `Validation` and `Transient`
/// are both "leave unacked" outcomes at the loop level — the taxonomy exists
/// so handlers can log the right thing, not so the loop treats them
/// differently; a redelivery is the only recovery path for either.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("schema validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-stage message handler invoked by [`run_stage_loop`]. One implementation
/// per service (Analyzer, Composer, Publisher); grounded in `spec.md` §4.2's
/// "per-stage handler" and DESIGN NOTES §9's "explicit interface per
/// collaborator" — this is the interface the shared loop itself consumes.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, entry: &StreamEntry) -> Result<(), StageError>;
}

/// Binds one worker to one stream + consumer group + consumer name (§4.2).
#[derive(Debug, Clone)]
pub struct StageLoopConfig {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    pub read_count: usize,
    pub block_ms: u64,
    pub reclaim_count: usize,
}

impl StageLoopConfig {
    pub fn new(stream: impl Into<String>, group: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            read_count: 10,
            block_ms: 5_000,
            reclaim_count: 10,
        }
    }
}

/// The shared worker loop (§4.2): ensure group exists, reclaim pending
/// entries left over from a prior run, then steady-state read/handle/ack
/// until `shutdown` is cancelled. Any error escaping a single iteration is
/// caught here and backed off 5s rather than killing the task, per the
/// "any exception escaping to the loop level" rule.
pub async fn run_stage_loop(
    bus: Arc<dyn Bus>,
    handler: Arc<dyn StageHandler>,
    metrics: Arc<StageMetrics>,
    config: StageLoopConfig,
    shutdown: CancellationToken,
) {
    if let Err(e) = bus.group_create(&config.stream, &config.group, "0").await {
        tracing::error!(error = %e, stream = %config.stream, group = %config.group, "failed to ensure consumer group exists");
    }

    reclaim_pending(&bus, &handler, &metrics, &config).await;

    loop {
        if shutdown.is_cancelled() {
            break;
        }
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = run_one_cycle(&bus, &handler, &metrics, &config) => result,
        };
        if let Err(e) = outcome {
            tracing::error!(error = %e, stream = %config.stream, "stage loop iteration failed, backing off 5s");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
            continue;
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_millis(poll_jitter_ms())) => {}
        }
    }
    tracing::info!(stream = %config.stream, group = %config.group, "stage loop exited");
}

async fn run_one_cycle(
    bus: &Arc<dyn Bus>,
    handler: &Arc<dyn StageHandler>,
    metrics: &Arc<StageMetrics>,
    config: &StageLoopConfig,
) -> anyhow::Result<()> {
    let read = bus
        .group_read(&config.stream, &config.group, &config.consumer, config.read_count, config.block_ms)
        .await?;
    for entry in &read.entries {
        process_entry(bus, handler, metrics, config, entry).await;
    }
    Ok(())
}

/// Startup reclaim path (§4.2 step 2): up to `reclaim_count` previously
/// delivered, unacked entries are claimed for this consumer and re-run
/// through the handler, achieving at-least-once delivery across restarts.
async fn reclaim_pending(
    bus: &Arc<dyn Bus>,
    handler: &Arc<dyn StageHandler>,
    metrics: &Arc<StageMetrics>,
    config: &StageLoopConfig,
) {
    let pending = match bus.pending(&config.stream, &config.group, config.reclaim_count).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "failed to enumerate pending entries on startup");
            return;
        }
    };
    if pending.is_empty() {
        return;
    }
    let ids: Vec<String> = pending.into_iter().map(|p| p.id).collect();
    tracing::info!(count = ids.len(), stream = %config.stream, "reclaiming pending entries from a previous run");
    let entries = match bus.claim(&config.stream, &config.group, &config.consumer, &ids).await {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "failed to claim pending entries");
            return;
        }
    };
    for entry in &entries {
        process_entry(bus, handler, metrics, config, entry).await;
    }
}

async fn process_entry(
    bus: &Arc<dyn Bus>,
    handler: &Arc<dyn StageHandler>,
    metrics: &Arc<StageMetrics>,
    config: &StageLoopConfig,
    entry: &StreamEntry,
) {
    match handler.handle(entry).await {
        Ok(()) => {
            metrics.record_success();
            if let Err(e) = bus.ack(&config.stream, &config.group, &entry.id).await {
                tracing::error!(error = %e, id = %entry.id, "ack failed after handler committed its effects");
            }
        }
        Err(e) => {
            metrics.record_failure();
            tracing::warn!(error = %e, id = %entry.id, stream = %config.stream, "handler failed, leaving message pending for redelivery");
        }
    }
}

/// Jittered 200-700ms inter-poll sleep (§4.2 step 5), derived from wall-clock
/// nanoseconds rather than the `rand` crate — the same cheap jitter source
/// `ravedigest-core::retry` uses.
fn poll_jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    200 + (nanos as u64 % 501)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravedigest_bus::MemoryBus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl StageHandler for CountingHandler {
        async fn handle(&self, _entry: &StreamEntry) -> Result<(), StageError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(StageError::Validation("first call fails".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn processes_one_message_and_acks_it() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "1".to_string());
        bus.append("raw_articles", &fields, 1000).await.unwrap();

        let handler = Arc::new(CountingHandler { calls: AtomicUsize::new(0), fail_first: false });
        let metrics = Arc::new(StageMetrics::new());
        let config = StageLoopConfig::new("raw_articles", "ravedigest-analyzer", "c1");
        bus.group_create(&config.stream, &config.group, "0").await.unwrap();

        run_one_cycle(&bus, &(handler.clone() as Arc<dyn StageHandler>), &metrics, &config).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        let info = bus.group_info(&config.stream, &config.group).await.unwrap().unwrap();
        assert!(info.is_drained());
        assert_eq!(metrics.messages_acked.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn failed_handler_leaves_message_pending() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "1".to_string());
        bus.append("raw_articles", &fields, 1000).await.unwrap();

        let handler = Arc::new(CountingHandler { calls: AtomicUsize::new(0), fail_first: true });
        let metrics = Arc::new(StageMetrics::new());
        let config = StageLoopConfig::new("raw_articles", "ravedigest-analyzer", "c1");
        bus.group_create(&config.stream, &config.group, "0").await.unwrap();

        run_one_cycle(&bus, &(handler.clone() as Arc<dyn StageHandler>), &metrics, &config).await.unwrap();

        let info = bus.group_info(&config.stream, &config.group).await.unwrap().unwrap();
        assert!(!info.is_drained());
        assert_eq!(metrics.messages_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn startup_reclaims_pending_entries_from_a_prior_run() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), "1".to_string());
        bus.append("raw_articles", &fields, 1000).await.unwrap();
        let config = StageLoopConfig::new("raw_articles", "ravedigest-analyzer", "old-consumer");
        bus.group_create(&config.stream, &config.group, "0").await.unwrap();
        // Simulate a prior run that read but crashed before acking.
        bus.group_read(&config.stream, &config.group, &config.consumer, 10, 0).await.unwrap();

        let handler = Arc::new(CountingHandler { calls: AtomicUsize::new(0), fail_first: false });
        let metrics = Arc::new(StageMetrics::new());
        let restarted_config = StageLoopConfig::new("raw_articles", "ravedigest-analyzer", "new-consumer");
        reclaim_pending(&bus, &(handler.clone() as Arc<dyn StageHandler>), &metrics, &restarted_config).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        let info = bus.group_info(&config.stream, &config.group).await.unwrap().unwrap();
        assert!(info.is_drained());
    }
}
