use std::sync::Arc;

use clap::Parser;
use ravedigest_bus::{Bus, RedisBus};
use ravedigest_collector::{build_router, AppState, CollectorService};
use ravedigest_core::config::{load_dotenv, Config};
use ravedigest_store::{PostgresStore, Store};
use ravedigest_worker::wait_for_shutdown_signal;
use tokio_util::sync::CancellationToken;

/// ravedigest collector — polls RSS sources and emits `raw_articles`.
#[derive(Parser, Debug)]
#[command(name = "collector-service", version, about)]
struct Cli {
    /// Port to bind the HTTP server on.
    #[arg(long, env = "COLLECTOR_PORT", default_value_t = 8001)]
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
    config.log_summary("collector");

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&config.redis.connection_string()).await?);

    let store = PostgresStore::connect(&config.postgres.connection_string(), config.postgres.max_connections).await?;
    store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(store);

    let service = Arc::new(CollectorService::new(
        bus,
        store,
        config.pipeline.rss_feeds.clone(),
        config.pipeline.stream_max_length,
    ));
    let state = Arc::new(AppState { service });

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "collector listening");

    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_for_serve.cancelled().await })
        .await?;

    signal_task.abort();
    Ok(())
}
