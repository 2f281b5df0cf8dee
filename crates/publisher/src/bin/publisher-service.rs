use std::sync::Arc;

use clap::Parser;
use ravedigest_bus::{Bus, RedisBus};
use ravedigest_core::config::{load_dotenv, Config};
use ravedigest_core::retry::RetryPolicy;
use ravedigest_kb::{KnowledgeBase, NotionKnowledgeBase};
use ravedigest_publisher::{build_router, AppState, PublisherHandler};
use ravedigest_store::{PostgresStore, Store};
use ravedigest_worker::{run_stage_loop, wait_for_shutdown_signal, StageHandler, StageLoopConfig, StageMetrics};
use tokio_util::sync::CancellationToken;

/// ravedigest publisher — pushes rendered digests to the knowledge base,
/// idempotency-guarded against redelivery.
#[derive(Parser, Debug)]
#[command(name = "publisher-service", version, about)]
struct Cli {
    #[arg(long, env = "PUBLISHER_PORT", default_value_t = 8004)]
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
    config.log_summary("publisher");

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&config.redis.connection_string()).await?);

    let store = PostgresStore::connect(&config.postgres.connection_string(), config.postgres.max_connections).await?;
    store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(store);

    let kb: Arc<dyn KnowledgeBase> = Arc::new(NotionKnowledgeBase::new(
        config.notion.api_key.clone(),
        config.notion.database_id.clone(),
    )?);
    let retry_policy = RetryPolicy::new(
        config.pipeline.max_retries,
        config.pipeline.retry_delay_secs,
        config.pipeline.retry_backoff_factor,
    );

    let handler: Arc<dyn StageHandler> = Arc::new(PublisherHandler::new(bus.clone(), store.clone(), kb, retry_policy));

    let metrics = Arc::new(StageMetrics::new());
    let group = config.pipeline.group_name("notion");
    let loop_config = StageLoopConfig::new("digest_stream", group.clone(), "publisher-1");

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let loop_task = tokio::spawn(run_stage_loop(bus.clone(), handler, metrics.clone(), loop_config, shutdown.clone()));

    let state = Arc::new(AppState {
        bus,
        store,
        metrics,
        stream: "digest_stream".to_string(),
        group,
    });
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "publisher listening");

    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_for_serve.cancelled().await })
        .await?;

    signal_task.abort();
    loop_task.await.ok();
    Ok(())
}
