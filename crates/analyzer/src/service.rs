use std::sync::Arc;

use async_trait::async_trait;
use ravedigest_bus::{Bus, StreamEntry};
use ravedigest_classify::DeveloperFocusClassifier;
use ravedigest_core::domain::{EnrichedArticle, RawArticle};
use ravedigest_core::retry::{with_backoff, RetryPolicy};
use ravedigest_extract::ContentExtractor;
use ravedigest_llm::{rouge_l_f1, LlmProvider, Message, Role};
use ravedigest_store::{EnrichmentUpsert, Store};
use ravedigest_worker::{StageError, StageHandler};

/// Per-message handler for the `raw_articles` → `enriched_articles` stage
/// (§4.4): validate, fetch + extract, summarize + score, classify, upsert,
/// emit, and (by the caller, on `Ok`) ack.
pub struct AnalyzerHandler {
    bus: Arc<dyn Bus>,
    store: Arc<dyn Store>,
    extractor: Arc<dyn ContentExtractor>,
    llm: Arc<dyn LlmProvider>,
    classifier: Arc<DeveloperFocusClassifier>,
    retry_policy: RetryPolicy,
    stream_max_length: u64,
    max_tokens: u32,
    temperature: f32,
}

impl AnalyzerHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<dyn Bus>,
        store: Arc<dyn Store>,
        extractor: Arc<dyn ContentExtractor>,
        llm: Arc<dyn LlmProvider>,
        classifier: Arc<DeveloperFocusClassifier>,
        retry_policy: RetryPolicy,
        stream_max_length: u32,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            bus,
            store,
            extractor,
            llm,
            classifier,
            retry_policy,
            stream_max_length: stream_max_length as u64,
            max_tokens,
            temperature,
        }
    }
}

fn summary_prompt(text: &str) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: "You summarize technical articles in 2-3 sentences for a developer audience. \
                      Be concise and factual; do not invent details not present in the source text."
                .to_string(),
        },
        Message { role: Role::User, content: text.to_string() },
    ]
}

#[async_trait]
impl StageHandler for AnalyzerHandler {
    async fn handle(&self, entry: &StreamEntry) -> Result<(), StageError> {
        let raw = RawArticle::from_fields(&entry.fields).map_err(|e| StageError::Validation(e.to_string()))?;

        let text = {
            let extractor = self.extractor.clone();
            let url = raw.url.clone();
            with_backoff(&self.retry_policy, move || {
                let extractor = extractor.clone();
                let url = url.clone();
                async move { extractor.extract(&url).await }
            })
            .await
            .map_err(|e| anyhow::anyhow!("content extraction failed for {}: {e}", raw.url))?
        };

        let summary = {
            let llm = self.llm.clone();
            let max_tokens = self.max_tokens;
            let temperature = self.temperature;
            let text = text.clone();
            with_backoff(&self.retry_policy, move || {
                let llm = llm.clone();
                let messages = summary_prompt(&text);
                async move { llm.complete(messages, temperature, max_tokens).await }
            })
            .await
            .map_err(|e| anyhow::anyhow!("llm summarization failed: {e}"))?
        };

        let relevance_score = rouge_l_f1(&text, &summary);
        let developer_focus = self.classifier.classify(&raw.title, &summary);

        let upsert = EnrichmentUpsert {
            id: raw.id,
            title: raw.title.clone(),
            url: raw.url.clone(),
            raw_summary: Some(raw.summary.clone()).filter(|s| !s.is_empty()),
            categories: raw.categories.clone(),
            published_at: raw.published_at,
            source: raw.source.clone(),
            llm_summary: summary,
            relevance_score,
            developer_focus,
        };
        self.store
            .upsert_enrichment(&upsert)
            .await
            .map_err(|e| anyhow::anyhow!("enrichment upsert failed: {e}"))?;

        let enriched = EnrichedArticle::from_raw(raw, relevance_score, developer_focus);
        self.bus
            .append("enriched_articles", &enriched.to_fields(), self.stream_max_length)
            .await
            .map_err(|e| anyhow::anyhow!("enriched_articles append failed: {e}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;
    use ravedigest_bus::MemoryBus;
    use ravedigest_extract::ExtractError;
    use ravedigest_llm::LlmError;
    use ravedigest_store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct StubExtractor(String);
    #[at]
    impl ContentExtractor for StubExtractor {
        async fn extract(&self, _url: &str) -> Result<String, ExtractError> {
            Ok(self.0.clone())
        }
    }

    struct StubLlm {
        reply: String,
        fail_until: AtomicU32,
    }
    #[at]
    impl LlmProvider for StubLlm {
        async fn complete(&self, _messages: Vec<Message>, _temperature: f32, _max_tokens: u32) -> Result<String, LlmError> {
            let remaining = self.fail_until.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_until.fetch_sub(1, Ordering::SeqCst);
                return Err(LlmError::ApiError { status: 503, body: "unavailable".into() });
            }
            Ok(self.reply.clone())
        }
    }

    fn entry_for(raw: &RawArticle) -> StreamEntry {
        StreamEntry { id: "1-0".to_string(), fields: raw.to_fields() }
    }

    #[tokio::test]
    async fn happy_path_enriches_and_emits() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let extractor: Arc<dyn ContentExtractor> = Arc::new(StubExtractor("body".to_string()));
        let llm: Arc<dyn LlmProvider> = Arc::new(StubLlm { reply: "SUM".to_string(), fail_until: AtomicU32::new(0) });
        let classifier = Arc::new(DeveloperFocusClassifier::fit(&["AI".to_string()], 0.6));

        let handler = AnalyzerHandler::new(
            bus.clone(),
            store.clone(),
            extractor,
            llm,
            classifier,
            RetryPolicy::new(3, 0.001, 2.0),
            1000,
            1000,
            0.7,
        );

        let raw = RawArticle::new(
            Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap(),
            "AI news".to_string(),
            "http://x/a".to_string(),
            "s".to_string(),
            vec![],
            None,
            "t".to_string(),
        );
        let entry = entry_for(&raw);

        handler.handle(&entry).await.unwrap();

        let article = store.get_article(raw.id).await.unwrap().unwrap();
        assert!(article.developer_focus);
        assert_eq!(article.llm_summary.as_deref(), Some("SUM"));

        bus.group_create("enriched_articles", "ravedigest-composer", "0").await.unwrap();
        let read = bus.group_read("enriched_articles", "ravedigest-composer", "c1", 10, 0).await.unwrap();
        assert_eq!(read.entries.len(), 1);
    }

    #[tokio::test]
    async fn llm_outage_then_recovery_succeeds_via_retry() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let extractor: Arc<dyn ContentExtractor> = Arc::new(StubExtractor("body".to_string()));
        let llm: Arc<dyn LlmProvider> = Arc::new(StubLlm { reply: "OK".to_string(), fail_until: AtomicU32::new(2) });
        let classifier = Arc::new(DeveloperFocusClassifier::fit(&[], 0.6));

        let handler = AnalyzerHandler::new(
            bus,
            store.clone(),
            extractor,
            llm,
            classifier,
            RetryPolicy::new(3, 0.001, 2.0),
            1000,
            1000,
            0.7,
        );

        let raw = RawArticle::new(Uuid::new_v4(), "t".to_string(), "http://x/b".to_string(), "s".to_string(), vec![], None, "src".to_string());
        let entry = entry_for(&raw);
        handler.handle(&entry).await.unwrap();

        let article = store.get_article(raw.id).await.unwrap().unwrap();
        assert_eq!(article.llm_summary.as_deref(), Some("OK"));
    }

    #[tokio::test]
    async fn structurally_invalid_payload_is_rejected_without_side_effects() {
        let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let extractor: Arc<dyn ContentExtractor> = Arc::new(StubExtractor("body".to_string()));
        let llm: Arc<dyn LlmProvider> = Arc::new(StubLlm { reply: "SUM".to_string(), fail_until: AtomicU32::new(0) });
        let classifier = Arc::new(DeveloperFocusClassifier::fit(&[], 0.6));

        let handler = AnalyzerHandler::new(bus, store, extractor, llm, classifier, RetryPolicy::default(), 1000, 1000, 0.7);

        let entry = StreamEntry { id: "1-0".to_string(), fields: Default::default() };
        let result = handler.handle(&entry).await;
        assert!(matches!(result, Err(StageError::Validation(_))));
    }
}
