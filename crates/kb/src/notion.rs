use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ravedigest_digest::KbBlock;
use serde_json::json;

use crate::error::KbError;

const MAX_SUMMARY_CHARS: usize = 2000;
const NOTION_API_VERSION: &str = "2022-06-28";

/// Properties + block list for one knowledge-base page (§4.6 step 5).
#[derive(Debug, Clone)]
pub struct KbPage {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub inserted_at: DateTime<Utc>,
    pub blocks: Vec<KbBlock>,
}

/// Publishes rendered digests to an external knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn publish_page(&self, page: &KbPage) -> Result<(), KbError>;
}

/// Notion-shaped `reqwest` client: one "create page" call per digest, with
/// a properties map and block-children list. Grounded in the collected
/// system's `notion_client.py` request shape; config (api key, database id)
/// is validated at construction time, matching the teacher's
/// `WebhookNotifier::new` pattern of failing fast on a misconfigured
/// collaborator rather than on the first call.
pub struct NotionKnowledgeBase {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
    base_url: String,
}

impl NotionKnowledgeBase {
    pub fn new(api_key: Option<String>, database_id: Option<String>) -> Result<Self, KbError> {
        let api_key = api_key.ok_or_else(|| KbError::NotConfigured("NOTION_API_KEY not set".into()))?;
        let database_id =
            database_id.ok_or_else(|| KbError::NotConfigured("NOTION_DB_ID not set".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            database_id,
            base_url: "https://api.notion.com/v1".to_string(),
        })
    }

    fn properties(&self, page: &KbPage) -> serde_json::Value {
        let summary: String = page.summary.chars().take(MAX_SUMMARY_CHARS).collect();
        json!({
            "Title": { "title": [{ "text": { "content": page.title } }] },
            "URL": { "url": page.url },
            "Source": { "rich_text": [{ "text": { "content": page.source } }] },
            "Summary": { "rich_text": [{ "text": { "content": summary } }] },
            "Inserted At": { "date": { "start": page.inserted_at.to_rfc3339() } },
        })
    }

    fn children(&self, page: &KbPage) -> Vec<serde_json::Value> {
        page.blocks
            .iter()
            .map(|block| match block {
                KbBlock::Paragraph(text) => json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": { "rich_text": [{ "text": { "content": text } }] },
                }),
                KbBlock::Divider => json!({ "object": "block", "type": "divider", "divider": {} }),
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeBase for NotionKnowledgeBase {
    async fn publish_page(&self, page: &KbPage) -> Result<(), KbError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": self.properties(page),
            "children": self.children(page),
        });

        let response = self
            .client
            .post(format!("{}/pages", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", NOTION_API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::Api { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> KbPage {
        KbPage {
            title: "Developer Digest".into(),
            url: "/digests/123".into(),
            source: "AI-Tech".into(),
            summary: "x".repeat(2500),
            inserted_at: Utc::now(),
            blocks: vec![KbBlock::Paragraph("hello".into()), KbBlock::Divider],
        }
    }

    #[test]
    fn missing_api_key_fails_at_construction() {
        let result = NotionKnowledgeBase::new(None, Some("db".into()));
        assert!(matches!(result, Err(KbError::NotConfigured(_))));
    }

    #[test]
    fn missing_database_id_fails_at_construction() {
        let result = NotionKnowledgeBase::new(Some("key".into()), None);
        assert!(matches!(result, Err(KbError::NotConfigured(_))));
    }

    #[test]
    fn summary_is_truncated_to_2000_chars() {
        let kb = NotionKnowledgeBase::new(Some("key".into()), Some("db".into())).unwrap();
        let props = kb.properties(&sample_page());
        let content = props["Summary"]["rich_text"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), 2000);
    }

    #[test]
    fn children_map_blocks_to_notion_shapes() {
        let kb = NotionKnowledgeBase::new(Some("key".into()), Some("db".into())).unwrap();
        let children = kb.children(&sample_page());
        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["type"], "paragraph");
        assert_eq!(children[1]["type"], "divider");
    }
}
