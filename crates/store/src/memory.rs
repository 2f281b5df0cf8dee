use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ravedigest_core::domain::{Article, Digest, RankedArticle};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{EnrichmentUpsert, Store};

#[derive(Default)]
pub struct MemoryStore {
    articles_by_id: Mutex<HashMap<Uuid, Article>>,
    urls: Mutex<std::collections::HashSet<String>>,
    digests: Mutex<HashMap<Uuid, Digest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_article_if_absent(&self, article: &Article) -> Result<bool, StoreError> {
        let mut urls = self.urls.lock().unwrap();
        if !urls.insert(article.url.clone()) {
            return Ok(false);
        }
        self.articles_by_id.lock().unwrap().insert(article.id, article.clone());
        Ok(true)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        Ok(self.articles_by_id.lock().unwrap().get(&id).cloned())
    }

    async fn upsert_enrichment(&self, input: &EnrichmentUpsert) -> Result<(), StoreError> {
        let mut articles = self.articles_by_id.lock().unwrap();
        match articles.get_mut(&input.id) {
            Some(existing) => {
                existing.apply_enrichment(input.llm_summary.clone(), input.relevance_score, input.developer_focus);
            }
            None => {
                self.urls.lock().unwrap().insert(input.url.clone());
                let mut article = Article {
                    id: input.id,
                    title: input.title.clone(),
                    url: input.url.clone(),
                    summary: input.raw_summary.clone(),
                    categories: input.categories.clone(),
                    published_at: input.published_at,
                    source: input.source.clone(),
                    llm_summary: None,
                    relevance_score: None,
                    developer_focus: false,
                    inserted_at: chrono::Utc::now(),
                };
                article.apply_enrichment(input.llm_summary.clone(), input.relevance_score, input.developer_focus);
                articles.insert(input.id, article);
            }
        }
        Ok(())
    }

    async fn top_developer_focused(&self, limit: i64) -> Result<Vec<RankedArticle>, StoreError> {
        let articles = self.articles_by_id.lock().unwrap();
        let mut ranked: Vec<RankedArticle> = articles
            .values()
            .filter(|a| a.developer_focus && a.relevance_score.is_some())
            .map(|a| RankedArticle {
                title: a.title.clone(),
                url: a.url.clone(),
                source: a.source.clone(),
                summary: a.llm_summary.clone().or_else(|| a.summary.clone()).unwrap_or_default(),
                relevance_score: a.relevance_score.unwrap_or(0.0),
            })
            .collect();
        ranked.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap());
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    async fn insert_digest(&self, digest: &Digest) -> Result<(), StoreError> {
        self.digests.lock().unwrap().insert(digest.id, digest.clone());
        Ok(())
    }

    async fn get_digest(&self, id: Uuid) -> Result<Option<Digest>, StoreError> {
        Ok(self.digests.lock().unwrap().get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(url: &str) -> Article {
        Article {
            id: Uuid::new_v4(),
            title: "t".into(),
            url: url.into(),
            summary: None,
            categories: vec![],
            published_at: None,
            source: "s".into(),
            llm_summary: None,
            relevance_score: None,
            developer_focus: false,
            inserted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_url_is_race_loser_skip() {
        let store = MemoryStore::new();
        let a = article("https://example.com/x");
        assert!(store.insert_article_if_absent(&a).await.unwrap());
        let b = article("https://example.com/x");
        assert!(!store.insert_article_if_absent(&b).await.unwrap());
    }

    #[tokio::test]
    async fn enrichment_upsert_inserts_full_record_when_absent() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let input = EnrichmentUpsert {
            id,
            title: "t".into(),
            url: "https://example.com/y".into(),
            raw_summary: Some("raw".into()),
            categories: vec![],
            published_at: None,
            source: "s".into(),
            llm_summary: "llm".into(),
            relevance_score: 0.8,
            developer_focus: true,
        };
        store.upsert_enrichment(&input).await.unwrap();
        let stored = store.get_article(id).await.unwrap().unwrap();
        assert_eq!(stored.llm_summary.as_deref(), Some("llm"));
        assert!(stored.developer_focus);
    }

    #[tokio::test]
    async fn top_developer_focused_orders_by_relevance_desc() {
        let store = MemoryStore::new();
        for (url, relevance) in [("u1", 0.2), ("u2", 0.9), ("u3", 0.5)] {
            let input = EnrichmentUpsert {
                id: Uuid::new_v4(),
                title: url.into(),
                url: url.into(),
                raw_summary: None,
                categories: vec![],
                published_at: None,
                source: "s".into(),
                llm_summary: "summary".into(),
                relevance_score: relevance,
                developer_focus: true,
            };
            store.upsert_enrichment(&input).await.unwrap();
        }
        let top = store.top_developer_focused(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].url, "u2");
        assert_eq!(top[1].url, "u3");
    }
}
