use std::sync::Arc;

use clap::Parser;
use ravedigest_core::config::{load_dotenv, Config};
use ravedigest_scheduler::{build_router, daily_schedule, duration_until_next, DailyJob};
use ravedigest_worker::wait_for_shutdown_signal;
use tokio_util::sync::CancellationToken;

/// ravedigest scheduler — fires the daily pipeline run and polls drain
/// predicates between stages; owns no mutable state of its own.
#[derive(Parser, Debug)]
#[command(name = "scheduler-service", version, about)]
struct Cli {
    #[arg(long, env = "SCHEDULER_PORT", default_value_t = 8005)]
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
    config.log_summary("scheduler");

    let schedule = daily_schedule(&config.scheduler.daily_run_time)?;
    let job = Arc::new(DailyJob::new(&config));

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let loop_shutdown = shutdown.clone();
    let loop_task = tokio::spawn(async move {
        loop {
            let delay = duration_until_next(&schedule);
            tracing::info!(?delay, "scheduler idle until next daily run");
            tokio::select! {
                _ = loop_shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            if loop_shutdown.is_cancelled() {
                break;
            }
            job.run_once().await;
        }
        tracing::info!("scheduler loop exited");
    });

    let app = build_router();
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "scheduler listening");

    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_for_serve.cancelled().await })
        .await?;

    signal_task.abort();
    loop_task.await.ok();
    Ok(())
}
