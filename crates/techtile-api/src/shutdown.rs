//! Graceful shutdown handling for the web server.

use std::time::Duration;

use crate::server::ServerState;

/// Shutdown timeout in seconds.
const SHUTDOWN_TIMEOUT: u64 = 30;

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Stop background jobs and report what was left in flight.
pub async fn cleanup_resources(state: &ServerState) {
    tracing::info!("Cleaning up resources...");

    state.control.shutdown().await;

    for request in state.control.pending().list() {
        tracing::info!(
            "Abandoning {} to {} ({}) without ack",
            request.command,
            request.device_id,
            request.request_id
        );
    }

    tracing::info!("Server uptime: {} seconds", state.uptime_secs());
}

/// Run graceful shutdown with timeout.
pub async fn shutdown_with_timeout(state: &ServerState) {
    match tokio::time::timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT),
        cleanup_resources(state),
    )
    .await
    {
        Ok(_) => {
            tracing::info!("Resources cleaned up successfully");
        }
        Err(_) => {
            tracing::warn!("Cleanup timed out after {} seconds", SHUTDOWN_TIMEOUT);
        }
    }
}
