use std::sync::Arc;

use chrono::Utc;
use ravedigest_bus::Bus;
use ravedigest_core::domain::{Digest, DigestReady};
use ravedigest_digest::{validate_markdown, DigestContext, TemplateRenderer, DEFAULT_TEMPLATE};
use ravedigest_store::Store;
use uuid::Uuid;

/// Ranks, renders, persists, and emits one digest (§4.5 steps 2-7). Shared by
/// the `enriched_articles` stage handler (triggered per message) and the
/// `POST /compose` endpoint (triggered directly by the Scheduler) — both
/// paths do the same work, they differ only in what invokes them.
pub struct ComposerService {
    bus: Arc<dyn Bus>,
    store: Arc<dyn Store>,
    renderer: TemplateRenderer,
    max_articles: i64,
    stream_max_length: u64,
}

impl ComposerService {
    pub fn new(bus: Arc<dyn Bus>, store: Arc<dyn Store>, max_articles: u32, stream_max_length: u32) -> Self {
        Self {
            bus,
            store,
            renderer: TemplateRenderer::new(),
            max_articles: max_articles as i64,
            stream_max_length: stream_max_length as u64,
        }
    }

    pub fn bus(&self) -> &Arc<dyn Bus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Composes a digest from the current top developer-focused articles.
    /// Returns `None` (not an error) if there is nothing to compose (§4.5
    /// step 3) — both callers treat that as a no-op.
    pub async fn compose(&self) -> anyhow::Result<Option<Digest>> {
        let articles = self.store.top_developer_focused(self.max_articles).await?;
        if articles.is_empty() {
            return Ok(None);
        }

        let title = format!("Developer Digest — {}", Utc::now().format("%Y-%m-%d"));
        let ctx = DigestContext { title: title.clone(), articles };
        let rendered = self.renderer.render(DEFAULT_TEMPLATE, &ctx)?;
        validate_markdown(&rendered)?;

        let id = Uuid::new_v4();
        let digest = Digest {
            id,
            title,
            url: format!("/digests/{id}"),
            summary: rendered,
            source: "AI-Tech".to_string(),
            inserted_at: Utc::now(),
        };
        self.store.insert_digest(&digest).await?;

        let ready = DigestReady::from_digest(&digest);
        self.bus.append("digest_stream", &ready.to_fields(), self.stream_max_length).await?;

        Ok(Some(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravedigest_bus::MemoryBus;
    use ravedigest_store::{EnrichmentUpsert, MemoryStore};

    async fn seed_developer_focused_article(store: &MemoryStore, relevance: f64) {
        store
            .upsert_enrichment(&EnrichmentUpsert {
                id: Uuid::new_v4(),
                title: "Async Rust Gets Faster".to_string(),
                url: format!("https://example.com/{}", Uuid::new_v4()),
                raw_summary: Some("feed summary".to_string()),
                categories: vec!["rust".to_string()],
                published_at: None,
                source: "example-feed".to_string(),
                llm_summary: "A deep dive into scheduler improvements.".to_string(),
                relevance_score: relevance,
                developer_focus: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn composes_digest_from_top_articles() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        seed_developer_focused_article(&store, 0.9).await;
        seed_developer_focused_article(&store, 0.5).await;

        let service = ComposerService::new(bus.clone(), store.clone(), 20, 1000);
        let digest = service.compose().await.unwrap().expect("should compose a digest");

        assert!(digest.summary.contains("## 1."));
        assert!(digest.summary.contains("**Summary:**"));
        assert_eq!(digest.url, format!("/digests/{}", digest.id));

        bus.group_create("digest_stream", "ravedigest-notion", "0").await.unwrap();
        let read = bus.group_read("digest_stream", "ravedigest-notion", "c1", 10, 0).await.unwrap();
        assert_eq!(read.entries.len(), 1);
    }

    #[tokio::test]
    async fn no_developer_focused_articles_composes_nothing() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let service = ComposerService::new(bus, store, 20, 1000);
        assert!(service.compose().await.unwrap().is_none());
    }
}
