use std::sync::Arc;

use clap::Parser;
use ravedigest_bus::{Bus, RedisBus};
use ravedigest_composer::{build_router, AppState, ComposerHandler, ComposerService};
use ravedigest_core::config::{load_dotenv, Config};
use ravedigest_store::{PostgresStore, Store};
use ravedigest_worker::{run_stage_loop, wait_for_shutdown_signal, StageHandler, StageLoopConfig, StageMetrics};
use tokio_util::sync::CancellationToken;

/// ravedigest composer — ranks developer-focused articles into a digest and
/// emits `digest_stream`. Runs a stage loop on `enriched_articles` and also
/// answers `POST /compose` directly.
#[derive(Parser, Debug)]
#[command(name = "composer-service", version, about)]
struct Cli {
    #[arg(long, env = "COMPOSER_PORT", default_value_t = 8003)]
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
    config.log_summary("composer");

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&config.redis.connection_string()).await?);

    let store = PostgresStore::connect(&config.postgres.connection_string(), config.postgres.max_connections).await?;
    store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(store);

    let service = Arc::new(ComposerService::new(
        bus.clone(),
        store,
        config.pipeline.max_articles_per_digest,
        config.pipeline.stream_max_length,
    ));

    let metrics = Arc::new(StageMetrics::new());
    let handler: Arc<dyn StageHandler> = Arc::new(ComposerHandler::new(service.clone()));
    let group = config.pipeline.group_name("composer");
    let loop_config = StageLoopConfig::new("enriched_articles", group, "composer-1");

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let loop_task = tokio::spawn(run_stage_loop(bus, handler, metrics.clone(), loop_config, shutdown.clone()));

    let state = Arc::new(AppState { service, metrics });
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "composer listening");

    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_for_serve.cancelled().await })
        .await?;

    signal_task.abort();
    loop_task.await.ok();
    Ok(())
}
