use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_csv(key: &str) -> Vec<String> {
    env_opt(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub openai: OpenAiConfig,
    pub notion: NotionConfig,
    pub pipeline: PipelineConfig,
    pub services: ServiceUrls,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            postgres: PostgresConfig::from_env(),
            redis: RedisConfig::from_env(),
            openai: OpenAiConfig::from_env(),
            notion: NotionConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            services: ServiceUrls::from_env(),
            logging: LoggingConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self, service: &str) {
        tracing::info!("{service} config loaded:");
        tracing::info!("  postgres: host={} db={}", self.postgres.host, self.postgres.database);
        tracing::info!("  redis:    host={} db={}", self.redis.host, self.redis.db);
        tracing::info!("  openai:   model={} configured={}", self.openai.model, self.openai.is_configured());
        tracing::info!("  notion:   configured={}", self.notion.is_configured());
        tracing::info!("  pipeline: group_prefix={} stream_max_len={}", self.pipeline.consumer_group_prefix, self.pipeline.stream_max_length);
        tracing::info!("  scheduler: daily_run_time={}", self.scheduler.daily_run_time);
    }

    /// Redacted view safe for HTTP status responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "postgres": { "host": self.postgres.host, "database": self.postgres.database, "configured": self.postgres.is_configured() },
            "redis": { "host": self.redis.host, "db": self.redis.db },
            "openai": { "model": self.openai.model, "configured": self.openai.is_configured() },
            "notion": { "configured": self.notion.is_configured() },
        })
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            url: env_opt("POSTGRES_URL"),
            host: env_or("POSTGRES_HOST", "localhost"),
            port: env_u16("POSTGRES_PORT", 5432),
            database: env_or("POSTGRES_DB", "ravedigest"),
            username: env_opt("POSTGRES_USER"),
            password: env_opt("POSTGRES_PASSWORD"),
            max_connections: env_u32("POSTGRES_MAX_CONNECTIONS", 10),
        }
    }

    /// Effective connection string: `POSTGRES_URL` wins if set, else assembled
    /// from the discrete `POSTGRES_{USER,PASSWORD,HOST,PORT,DB}` parts.
    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}",
            user, pass, self.host, self.port, self.database
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.username.is_some()
    }
}

// ── Redis ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub password: Option<String>,
    pub timeout_secs: f64,
}

impl RedisConfig {
    fn from_env() -> Self {
        Self {
            url: env_opt("REDIS_URL"),
            host: env_or("REDIS_HOST", "localhost"),
            port: env_u16("REDIS_PORT", 6379),
            db: env_u32("REDIS_DB", 0),
            password: env_opt("REDIS_PASSWORD"),
            timeout_secs: env_f64("REDIS_TIMEOUT", 5.0),
        }
    }

    /// Effective connection string: `REDIS_URL` wins if set, else assembled.
    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(pass) => format!("redis://:{}@{}:{}/{}", pass, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

// ── OpenAI ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl OpenAiConfig {
    fn from_env() -> Self {
        Self {
            api_key: env_opt("OPENAI_API_KEY"),
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            base_url: env_opt("OPENAI_BASE_URL"),
            max_tokens: env_u32("OPENAI_MAX_TOKENS", 1000),
            temperature: env_f64("OPENAI_TEMPERATURE", 0.7) as f32,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ── Notion (knowledge base) ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    pub api_key: Option<String>,
    pub database_id: Option<String>,
}

impl NotionConfig {
    fn from_env() -> Self {
        Self {
            api_key: env_opt("NOTION_API_KEY"),
            database_id: env_opt("NOTION_DB_ID"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.database_id.is_some()
    }
}

// ── Pipeline tuning ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub rss_feeds: Vec<String>,
    pub developer_keywords: Vec<String>,
    pub cosine_similarity_threshold: f64,
    pub max_articles_per_digest: u32,
    pub stream_max_length: u32,
    pub consumer_group_prefix: String,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub retry_backoff_factor: f64,
    pub http_timeout_secs: f64,
}

impl PipelineConfig {
    fn from_env() -> Self {
        Self {
            rss_feeds: env_csv("RSS_FEEDS"),
            developer_keywords: env_csv("DEVELOPER_KEYWORDS"),
            cosine_similarity_threshold: env_f64("COSINE_SIMILARITY_THRESHOLD", 0.6),
            max_articles_per_digest: env_u32("MAX_ARTICLES_PER_DIGEST", 20),
            stream_max_length: env_u32("STREAM_MAX_LENGTH", 1000),
            consumer_group_prefix: env_or("CONSUMER_GROUP_PREFIX", "ravedigest"),
            max_retries: env_u32("MAX_RETRIES", 3),
            retry_delay_secs: env_f64("RETRY_DELAY", 1.0),
            retry_backoff_factor: env_f64("RETRY_BACKOFF_FACTOR", 2.0),
            http_timeout_secs: env_f64("HTTP_TIMEOUT", 30.0),
        }
    }

    pub fn group_name(&self, stage: &str) -> String {
        format!("{}-{}", self.consumer_group_prefix, stage)
    }
}

// ── Downstream service URLs (Scheduler) ───────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUrls {
    pub collector_url: String,
    pub composer_url: String,
    pub analyzer_url: String,
    pub notion_worker_url: String,
}

impl ServiceUrls {
    fn from_env() -> Self {
        Self {
            collector_url: env_or("COLLECTOR_URL", "http://collector:8001"),
            composer_url: env_or("COMPOSER_URL", "http://composer:8003"),
            analyzer_url: env_or("ANALYZER_URL", "http://analyzer:8002"),
            notion_worker_url: env_or("NOTION_WORKER_URL", "http://notion-worker:8004"),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Local time-of-day the daily job fires, `HH:MM` (§4.7, default 08:30).
    pub daily_run_time: String,
    pub drain_poll_interval_secs: u64,
    pub drain_max_attempts: u32,
    pub trigger_max_retries: u32,
    pub trigger_retry_delay_secs: u64,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        Self {
            daily_run_time: env_or("SCHEDULER_DAILY_RUN_TIME", "08:30"),
            drain_poll_interval_secs: env_u32("SCHEDULER_DRAIN_POLL_INTERVAL", 10) as u64,
            drain_max_attempts: env_u32("SCHEDULER_DRAIN_MAX_ATTEMPTS", 35),
            trigger_max_retries: env_u32("SCHEDULER_TRIGGER_MAX_RETRIES", 3),
            trigger_retry_delay_secs: env_u32("SCHEDULER_TRIGGER_RETRY_DELAY", 5) as u64,
        }
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl LoggingConfig {
    fn from_env() -> Self {
        Self {
            level: env_or("LOG_LEVEL", "INFO"),
            json: env_bool("JSON_LOGS", false),
        }
    }
}
