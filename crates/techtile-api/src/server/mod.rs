//! HTTP server for the control plane.

pub mod router;
pub mod types;

pub use router::create_router_with_state;
pub use types::ServerState;

use std::net::SocketAddr;

/// Serve the API on `bind` until a shutdown signal arrives, then clean up.
pub async fn run(bind: SocketAddr, state: ServerState, cors: bool) -> anyhow::Result<()> {
    let app = create_router_with_state(state.clone(), cors);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("HTTP API listening on http://{}", listener.local_addr()?);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown::shutdown_signal())
        .await?;

    // Clean up resources after server shuts down
    crate::shutdown::shutdown_with_timeout(&state).await;
    Ok(())
}
