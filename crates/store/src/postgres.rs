use async_trait::async_trait;
use ravedigest_core::domain::{Article, Digest, RankedArticle};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{EnrichmentUpsert, Store};

/// Postgres-backed `Store`. Pool tuning mirrors the teacher's
/// `init_pg_pool`: bounded size (10 + overflow handled by `max_connections`),
/// `test_before_acquire` in place of the teacher's `pool_pre_ping`, and a
/// recycle/lifetime cap (§5).
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .test_before_acquire(true)
            .max_lifetime(Duration::from_secs(3600))
            .connect(connection_string)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    url: String,
    summary: Option<String>,
    categories: Vec<String>,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    source: String,
    llm_summary: Option<String>,
    relevance_score: Option<f32>,
    developer_focus: bool,
    inserted_at: chrono::DateTime<chrono::Utc>,
}

impl From<ArticleRow> for Article {
    fn from(r: ArticleRow) -> Self {
        Article {
            id: r.id,
            title: r.title,
            url: r.url,
            summary: r.summary,
            categories: r.categories,
            published_at: r.published_at,
            source: r.source,
            llm_summary: r.llm_summary,
            relevance_score: r.relevance_score.map(|v| v as f64),
            developer_focus: r.developer_focus,
            inserted_at: r.inserted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RankedArticleRow {
    title: String,
    url: String,
    source: String,
    summary: String,
    relevance_score: f32,
}

impl From<RankedArticleRow> for RankedArticle {
    fn from(r: RankedArticleRow) -> Self {
        RankedArticle {
            title: r.title,
            url: r.url,
            source: r.source,
            summary: r.summary,
            relevance_score: r.relevance_score as f64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DigestRow {
    id: Uuid,
    title: String,
    url: String,
    summary: String,
    source: String,
    inserted_at: chrono::DateTime<chrono::Utc>,
}

impl From<DigestRow> for Digest {
    fn from(r: DigestRow) -> Self {
        Digest {
            id: r.id,
            title: r.title,
            url: r.url,
            summary: r.summary,
            source: r.source,
            inserted_at: r.inserted_at,
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_article_if_absent(&self, article: &Article) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO rave_articles
                (id, title, url, summary, categories, published_at, source, inserted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(article.id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.summary)
        .bind(&article.categories)
        .bind(article.published_at)
        .bind(&article.source)
        .bind(article.inserted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, url, summary, categories, published_at, source,
                   llm_summary, relevance_score, developer_focus, inserted_at
            FROM rave_articles WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(row.map(Article::from))
    }

    async fn upsert_enrichment(&self, input: &EnrichmentUpsert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO rave_articles
                (id, title, url, summary, categories, published_at, source,
                 llm_summary, relevance_score, developer_focus)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                llm_summary = EXCLUDED.llm_summary,
                relevance_score = EXCLUDED.relevance_score,
                developer_focus = EXCLUDED.developer_focus
            "#,
        )
        .bind(input.id)
        .bind(&input.title)
        .bind(&input.url)
        .bind(&input.raw_summary)
        .bind(&input.categories)
        .bind(input.published_at)
        .bind(&input.source)
        .bind(&input.llm_summary)
        .bind(input.relevance_score as f32)
        .bind(input.developer_focus)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn top_developer_focused(&self, limit: i64) -> Result<Vec<RankedArticle>, StoreError> {
        let rows = sqlx::query_as::<_, RankedArticleRow>(
            r#"
            SELECT title, url, source, COALESCE(llm_summary, summary, '') AS summary, relevance_score
            FROM rave_articles
            WHERE developer_focus AND relevance_score IS NOT NULL
            ORDER BY relevance_score DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(rows.into_iter().map(RankedArticle::from).collect())
    }

    async fn insert_digest(&self, digest: &Digest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO digests (id, title, url, summary, source, inserted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(digest.id)
        .bind(&digest.title)
        .bind(&digest.url)
        .bind(&digest.summary)
        .bind(&digest.source)
        .bind(digest.inserted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn get_digest(&self, id: Uuid) -> Result<Option<Digest>, StoreError> {
        let row = sqlx::query_as::<_, DigestRow>(
            "SELECT id, title, url, summary, source, inserted_at FROM digests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(row.map(Digest::from))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
