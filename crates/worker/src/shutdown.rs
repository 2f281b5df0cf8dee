use tokio_util::sync::CancellationToken;

/// Waits for SIGTERM (or Ctrl+C, for local runs) and cancels `token`. Every
/// service spawns this alongside its worker loop(s) and axum server so a
/// single signal drains both (§5 "Cancellation and shutdown").
pub async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight work");
    token.cancel();
}
