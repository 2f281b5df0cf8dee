use std::sync::Arc;

use async_trait::async_trait;
use ravedigest_bus::StreamEntry;
use ravedigest_core::domain::EnrichedArticle;
use ravedigest_worker::{StageError, StageHandler};

use crate::service::ComposerService;

/// Per-message handler for the `enriched_articles` stream (§4.5): each
/// message is only a trigger, not an input — the actual composition re-reads
/// the current top developer-focused articles from the store, per the
/// "trigger on every enriched article" rationale.
pub struct ComposerHandler {
    service: Arc<ComposerService>,
}

impl ComposerHandler {
    pub fn new(service: Arc<ComposerService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StageHandler for ComposerHandler {
    async fn handle(&self, entry: &StreamEntry) -> Result<(), StageError> {
        EnrichedArticle::from_fields(&entry.fields).map_err(|e| StageError::Validation(e.to_string()))?;
        self.service.compose().await?;
        Ok(())
    }
}
