use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ravedigest_core::domain::{Article, Digest, RankedArticle};
use uuid::Uuid;

use crate::error::StoreError;

/// Fallback-insert fields for the Analyzer's upsert (§4.4 step 5): if the
/// article row already exists only the enrichment columns are overwritten,
/// but if it doesn't, the full record is inserted from these fields.
#[derive(Debug, Clone)]
pub struct EnrichmentUpsert {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub raw_summary: Option<String>,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub llm_summary: String,
    pub relevance_score: f64,
    pub developer_focus: bool,
}

/// The relational store's surface (§6 `rave_articles`/`digests` tables).
/// Grounded in the teacher's `sqlx::query_as::<_, T>` session pattern
/// (acquire → operate → release on every path via the pool), generalized
/// from a single monolithic API server to this pipeline's per-stage
/// read/write needs.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a newly-collected article. Returns `true` if inserted,
    /// `false` if the url already existed (Collector treats this as a
    /// race-loser skip, not an error, per §4.3).
    async fn insert_article_if_absent(&self, article: &Article) -> Result<bool, StoreError>;

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>, StoreError>;

    /// Upsert enrichment fields by id (§4.4 step 5): overwrite if present,
    /// insert the full record otherwise. Enrichment fields are monotonic —
    /// never cleared back to null by this call.
    async fn upsert_enrichment(&self, input: &EnrichmentUpsert) -> Result<(), StoreError>;

    /// Top developer-focused articles ordered by relevance descending
    /// (§4.5 step 2).
    async fn top_developer_focused(&self, limit: i64) -> Result<Vec<RankedArticle>, StoreError>;

    async fn insert_digest(&self, digest: &Digest) -> Result<(), StoreError>;

    async fn get_digest(&self, id: Uuid) -> Result<Option<Digest>, StoreError>;

    /// Cheap reachability check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError>;
}
