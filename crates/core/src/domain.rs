use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Schema version stamped on every stream message and persisted record.
pub const SCHEMA_VERSION: &str = "1.0";

/// A required stream field, missing or empty → structural validation
/// failure (§4.4 step 1, §7 "Validation" taxonomy entry).
fn require_field(fields: &HashMap<String, String>, key: &str) -> Result<String, CoreError> {
    fields
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| CoreError::InvalidSchema(format!("missing required field '{key}'")))
}

fn split_categories(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn parse_optional_timestamp(raw: Option<&String>) -> Result<Option<DateTime<Utc>>, CoreError> {
    match raw.map(|s| s.as_str()) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| CoreError::InvalidSchema(format!("invalid published_at '{s}': {e}"))),
    }
}

fn check_version(fields: &HashMap<String, String>) -> Result<String, CoreError> {
    let version = require_field(fields, "version")?;
    if version != SCHEMA_VERSION {
        return Err(CoreError::InvalidSchema(format!("unsupported schema version '{version}'")));
    }
    Ok(version)
}

/// A persisted article record. Mirrors the `rave_articles` table (§6).
///
/// Enrichment fields (`llm_summary`, `relevance_score`, `developer_focus`) are
/// monotonic: once set non-null they may be overwritten but never cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub llm_summary: Option<String>,
    pub relevance_score: Option<f64>,
    pub developer_focus: bool,
    pub inserted_at: DateTime<Utc>,
}

impl Article {
    /// Apply an Analyzer enrichment result on top of the stored record,
    /// never clearing an already-set field back to null.
    pub fn apply_enrichment(&mut self, summary: String, relevance: f64, developer_focus: bool) {
        self.llm_summary = Some(summary);
        self.relevance_score = Some(relevance);
        self.developer_focus = developer_focus;
    }
}

/// A persisted digest record. Mirrors the `digests` table (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Digest {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: String,
    pub inserted_at: DateTime<Utc>,
}

/// A ranked article fed into the digest template (Composer step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub relevance_score: f64,
}

/// `raw_articles` stream message, emitted by the Collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawArticle {
    pub version: String,
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
}

impl RawArticle {
    pub fn new(
        id: Uuid,
        title: String,
        url: String,
        summary: String,
        categories: Vec<String>,
        published_at: Option<DateTime<Utc>>,
        source: String,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            id,
            title,
            url,
            summary,
            categories,
            published_at,
            source,
        }
    }

    /// Wire encoding for the `raw_articles` stream (§3): booleans and other
    /// non-string fields aside, this message has none — just the comma-join
    /// and RFC-3339-or-empty conventions.
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("version".to_string(), self.version.clone());
        fields.insert("id".to_string(), self.id.to_string());
        fields.insert("title".to_string(), self.title.clone());
        fields.insert("url".to_string(), self.url.clone());
        fields.insert("summary".to_string(), self.summary.clone());
        fields.insert("categories".to_string(), self.categories.join(","));
        fields.insert(
            "published_at".to_string(),
            self.published_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        );
        fields.insert("source".to_string(), self.source.clone());
        fields
    }

    /// Decodes a `raw_articles` entry, rejecting structurally invalid
    /// payloads (§4.4 step 1) rather than panicking or guessing defaults for
    /// required fields.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, CoreError> {
        let version = check_version(fields)?;
        let id = require_field(fields, "id")?
            .parse::<Uuid>()
            .map_err(|e| CoreError::InvalidSchema(format!("invalid id: {e}")))?;
        Ok(Self {
            version,
            id,
            title: require_field(fields, "title")?,
            url: require_field(fields, "url")?,
            summary: fields.get("summary").cloned().unwrap_or_default(),
            categories: fields.get("categories").map(|c| split_categories(c)).unwrap_or_default(),
            published_at: parse_optional_timestamp(fields.get("published_at"))?,
            source: require_field(fields, "source")?,
        })
    }
}

/// `enriched_articles` stream message, emitted by the Analyzer. Carries every
/// `RawArticle` field plus the enrichment outputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedArticle {
    pub version: String,
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub relevance_score: f64,
    pub developer_focus: bool,
}

impl EnrichedArticle {
    pub fn from_raw(raw: RawArticle, relevance_score: f64, developer_focus: bool) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            id: raw.id,
            title: raw.title,
            url: raw.url,
            summary: raw.summary,
            categories: raw.categories,
            published_at: raw.published_at,
            source: raw.source,
            relevance_score,
            developer_focus,
        }
    }

    /// Wire encoding for the `enriched_articles` stream (§3): every
    /// `raw_articles` field plus `relevance_score` as a decimal string and
    /// `developer_focus` as the literal `true`/`false`.
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("version".to_string(), self.version.clone());
        fields.insert("id".to_string(), self.id.to_string());
        fields.insert("title".to_string(), self.title.clone());
        fields.insert("url".to_string(), self.url.clone());
        fields.insert("summary".to_string(), self.summary.clone());
        fields.insert("categories".to_string(), self.categories.join(","));
        fields.insert(
            "published_at".to_string(),
            self.published_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        );
        fields.insert("source".to_string(), self.source.clone());
        fields.insert("relevance_score".to_string(), self.relevance_score.to_string());
        fields.insert("developer_focus".to_string(), self.developer_focus.to_string());
        fields
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, CoreError> {
        let version = check_version(fields)?;
        let id = require_field(fields, "id")?
            .parse::<Uuid>()
            .map_err(|e| CoreError::InvalidSchema(format!("invalid id: {e}")))?;
        let relevance_score = require_field(fields, "relevance_score")?
            .parse::<f64>()
            .map_err(|e| CoreError::InvalidSchema(format!("invalid relevance_score: {e}")))?;
        let developer_focus = match require_field(fields, "developer_focus")?.as_str() {
            "true" => true,
            "false" => false,
            other => return Err(CoreError::InvalidSchema(format!("invalid developer_focus: '{other}'"))),
        };
        Ok(Self {
            version,
            id,
            title: require_field(fields, "title")?,
            url: require_field(fields, "url")?,
            summary: fields.get("summary").cloned().unwrap_or_default(),
            categories: fields.get("categories").map(|c| split_categories(c)).unwrap_or_default(),
            published_at: parse_optional_timestamp(fields.get("published_at"))?,
            source: require_field(fields, "source")?,
            relevance_score,
            developer_focus,
        })
    }
}

/// `digest_stream` message, emitted by the Composer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigestReady {
    pub version: String,
    pub digest_id: Uuid,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub inserted_at: DateTime<Utc>,
}

impl DigestReady {
    pub fn from_digest(digest: &Digest) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            digest_id: digest.id,
            title: digest.title.clone(),
            summary: digest.summary.clone(),
            url: digest.url.clone(),
            source: digest.source.clone(),
            inserted_at: digest.inserted_at,
        }
    }

    /// Wire encoding for the `digest_stream` message (§3).
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("version".to_string(), self.version.clone());
        fields.insert("digest_id".to_string(), self.digest_id.to_string());
        fields.insert("title".to_string(), self.title.clone());
        fields.insert("summary".to_string(), self.summary.clone());
        fields.insert("url".to_string(), self.url.clone());
        fields.insert("source".to_string(), self.source.clone());
        fields.insert("inserted_at".to_string(), self.inserted_at.to_rfc3339());
        fields
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, CoreError> {
        let version = check_version(fields)?;
        let digest_id = require_field(fields, "digest_id")?
            .parse::<Uuid>()
            .map_err(|e| CoreError::InvalidSchema(format!("invalid digest_id: {e}")))?;
        let inserted_at_raw = require_field(fields, "inserted_at")?;
        let inserted_at = DateTime::parse_from_rfc3339(&inserted_at_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CoreError::InvalidSchema(format!("invalid inserted_at: {e}")))?;
        Ok(Self {
            version,
            digest_id,
            title: require_field(fields, "title")?,
            summary: require_field(fields, "summary")?,
            url: require_field(fields, "url")?,
            source: require_field(fields, "source")?,
            inserted_at,
        })
    }
}

/// Bus key prefix for the published-digest idempotency marker.
pub fn digest_published_key(digest_id: Uuid) -> String {
    format!("digest_published:{}", digest_id)
}

/// TTL (seconds) on the published-digest marker: one day.
pub const DIGEST_PUBLISHED_TTL_SECS: u64 = 86_400;
