use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ravedigest_analyzer::{build_router, AnalyzerHandler, AppState};
use ravedigest_bus::{Bus, RedisBus};
use ravedigest_classify::DeveloperFocusClassifier;
use ravedigest_core::config::{load_dotenv, Config};
use ravedigest_core::retry::RetryPolicy;
use ravedigest_extract::{ContentExtractor, HtmlExtractor};
use ravedigest_llm::{create_provider, LlmProvider};
use ravedigest_store::{PostgresStore, Store};
use ravedigest_worker::{run_stage_loop, wait_for_shutdown_signal, StageHandler, StageLoopConfig, StageMetrics};
use tokio_util::sync::CancellationToken;

/// ravedigest analyzer — fetches article bodies, summarizes and scores them
/// with an LLM, classifies developer focus, and emits `enriched_articles`.
#[derive(Parser, Debug)]
#[command(name = "analyzer-service", version, about)]
struct Cli {
    #[arg(long, env = "ANALYZER_PORT", default_value_t = 8002)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary("analyzer");

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&config.redis.connection_string()).await?);

    let store = PostgresStore::connect(&config.postgres.connection_string(), config.postgres.max_connections).await?;
    store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(store);

    let llm: Arc<dyn LlmProvider> = Arc::from(create_provider(&config.openai)?);
    let extractor: Arc<dyn ContentExtractor> = Arc::new(HtmlExtractor::new(Duration::from_secs_f64(config.pipeline.http_timeout_secs)));
    let classifier = Arc::new(DeveloperFocusClassifier::fit(
        &config.pipeline.developer_keywords,
        config.pipeline.cosine_similarity_threshold,
    ));
    let retry_policy = RetryPolicy::new(
        config.pipeline.max_retries,
        config.pipeline.retry_delay_secs,
        config.pipeline.retry_backoff_factor,
    );

    let handler: Arc<dyn StageHandler> = Arc::new(AnalyzerHandler::new(
        bus.clone(),
        store.clone(),
        extractor,
        llm,
        classifier,
        retry_policy,
        config.pipeline.stream_max_length,
        config.openai.max_tokens,
        config.openai.temperature,
    ));

    let metrics = Arc::new(StageMetrics::new());
    let group = config.pipeline.group_name("analyzer");
    let loop_config = StageLoopConfig::new("raw_articles", group.clone(), "analyzer-1");

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let loop_task = tokio::spawn(run_stage_loop(bus.clone(), handler, metrics.clone(), loop_config, shutdown.clone()));

    let state = Arc::new(AppState {
        bus,
        store,
        metrics,
        stream: "raw_articles".to_string(),
        group,
    });
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "analyzer listening");

    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_for_serve.cancelled().await })
        .await?;

    signal_task.abort();
    loop_task.await.ok();
    Ok(())
}
