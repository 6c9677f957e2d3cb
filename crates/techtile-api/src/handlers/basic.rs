//! Basic handlers - health check.

use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::json;

use super::ServerState;

/// Detailed health response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: &'static str,
    pub uptime: u64,
    pub pending_requests: usize,
    pub background_jobs: usize,
}

/// Basic health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "techtile-control",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Health check with uptime and control plane counters.
pub async fn health_status_handler(State(state): State<ServerState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        service: "techtile-control".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.uptime_secs(),
        pending_requests: state.control.pending().len(),
        background_jobs: state.control.scheduler().active_jobs().await,
    })
}
