use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ravedigest_bus::{Bus, StreamEntry};
use ravedigest_core::domain::{digest_published_key, DigestReady, DIGEST_PUBLISHED_TTL_SECS};
use ravedigest_core::retry::{with_backoff, RetryPolicy};
use ravedigest_digest::to_kb_blocks;
use ravedigest_kb::{KbPage, KnowledgeBase};
use ravedigest_store::Store;
use ravedigest_worker::{StageError, StageHandler};

/// Per-message handler for the `digest_stream` → knowledge-base publish
/// stage (§4.6): validate, idempotency-check, load, parse to blocks, publish
/// with retry, mark published, ack.
pub struct PublisherHandler {
    bus: Arc<dyn Bus>,
    store: Arc<dyn Store>,
    kb: Arc<dyn KnowledgeBase>,
    retry_policy: RetryPolicy,
}

impl PublisherHandler {
    pub fn new(bus: Arc<dyn Bus>, store: Arc<dyn Store>, kb: Arc<dyn KnowledgeBase>, retry_policy: RetryPolicy) -> Self {
        Self { bus, store, kb, retry_policy }
    }
}

#[async_trait]
impl StageHandler for PublisherHandler {
    async fn handle(&self, entry: &StreamEntry) -> Result<(), StageError> {
        let ready = DigestReady::from_fields(&entry.fields).map_err(|e| StageError::Validation(e.to_string()))?;

        let marker_key = digest_published_key(ready.digest_id);
        let already_published = self
            .bus
            .get(&marker_key)
            .await
            .map_err(|e| anyhow::anyhow!("published-marker lookup failed: {e}"))?;
        if already_published.is_some() {
            return Ok(());
        }

        let digest = self
            .store
            .get_digest(ready.digest_id)
            .await
            .map_err(|e| anyhow::anyhow!("digest lookup failed: {e}"))?;
        let Some(digest) = digest else {
            tracing::error!(digest_id = %ready.digest_id, "digest row missing at publish time, nothing to publish");
            return Ok(());
        };

        let blocks = to_kb_blocks(&digest.summary);
        let page = KbPage {
            title: digest.title.clone(),
            url: digest.url.clone(),
            source: digest.source.clone(),
            summary: digest.summary.clone(),
            inserted_at: digest.inserted_at,
            blocks,
        };

        {
            let kb = self.kb.clone();
            with_backoff(&self.retry_policy, move || {
                let kb = kb.clone();
                let page = page.clone();
                async move { kb.publish_page(&page).await }
            })
            .await
            .map_err(|e| anyhow::anyhow!("knowledge-base publish failed: {e}"))?;
        }

        self.bus
            .set(&marker_key, "1", Some(Duration::from_secs(DIGEST_PUBLISHED_TTL_SECS)))
            .await
            .map_err(|e| anyhow::anyhow!("failed to set published marker: {e}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ravedigest_bus::MemoryBus;
    use ravedigest_core::domain::Digest;
    use ravedigest_kb::KbError;
    use ravedigest_store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct StubKb {
        calls: AtomicU32,
        fail_until: u32,
    }

    #[async_trait]
    impl KnowledgeBase for StubKb {
        async fn publish_page(&self, _page: &KbPage) -> Result<(), KbError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_until {
                return Err(KbError::Api { status: 503, body: "unavailable".into() });
            }
            Ok(())
        }
    }

    fn entry_for(ready: &DigestReady) -> StreamEntry {
        StreamEntry { id: "1-0".to_string(), fields: ready.to_fields() }
    }

    async fn seed_digest(store: &MemoryStore, id: Uuid) -> Digest {
        let digest = Digest {
            id,
            title: "Developer Digest".to_string(),
            url: format!("/digests/{id}"),
            summary: "## 1. [t](u)\n\n**Source:** s\n**Summary:** sum\n".to_string(),
            source: "AI-Tech".to_string(),
            inserted_at: Utc::now(),
        };
        store.insert_digest(&digest).await.unwrap();
        digest
    }

    #[tokio::test]
    async fn publishes_and_sets_marker() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let digest = seed_digest(&store, id).await;
        let kb: Arc<dyn KnowledgeBase> = Arc::new(StubKb { calls: AtomicU32::new(0), fail_until: 0 });

        let handler = PublisherHandler::new(bus.clone(), store, kb, RetryPolicy::new(3, 0.001, 2.0));
        let ready = DigestReady::from_digest(&digest);
        handler.handle(&entry_for(&ready)).await.unwrap();

        assert!(bus.get(&digest_published_key(id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn already_published_digest_is_skipped_without_calling_kb() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let digest = seed_digest(&store, id).await;
        bus.set(&digest_published_key(id), "1", None).await.unwrap();

        struct PanicKb;
        #[async_trait]
        impl KnowledgeBase for PanicKb {
            async fn publish_page(&self, _page: &KbPage) -> Result<(), KbError> {
                panic!("should not be called for an already-published digest");
            }
        }
        let kb: Arc<dyn KnowledgeBase> = Arc::new(PanicKb);

        let handler = PublisherHandler::new(bus, store, kb, RetryPolicy::default());
        let ready = DigestReady::from_digest(&digest);
        handler.handle(&entry_for(&ready)).await.unwrap();
    }

    #[tokio::test]
    async fn missing_digest_row_is_treated_as_ack_no_op() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let kb: Arc<dyn KnowledgeBase> = Arc::new(StubKb { calls: AtomicU32::new(0), fail_until: 0 });
        let handler = PublisherHandler::new(bus, store, kb, RetryPolicy::default());

        let ready = DigestReady {
            version: ravedigest_core::domain::SCHEMA_VERSION.to_string(),
            digest_id: Uuid::new_v4(),
            title: "t".to_string(),
            summary: "s".to_string(),
            url: "/digests/missing".to_string(),
            source: "AI-Tech".to_string(),
            inserted_at: Utc::now(),
        };
        handler.handle(&entry_for(&ready)).await.unwrap();
    }

    #[tokio::test]
    async fn transient_kb_failure_recovers_via_retry() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let digest = seed_digest(&store, id).await;
        let kb: Arc<dyn KnowledgeBase> = Arc::new(StubKb { calls: AtomicU32::new(0), fail_until: 2 });

        let handler = PublisherHandler::new(bus.clone(), store, kb, RetryPolicy::new(3, 0.001, 2.0));
        let ready = DigestReady::from_digest(&digest);
        handler.handle(&entry_for(&ready)).await.unwrap();

        assert!(bus.get(&digest_published_key(id)).await.unwrap().is_some());
    }
}
