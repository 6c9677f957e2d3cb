//! Device reachability handler.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use techtile_control::round_trip_ms;

use super::ServerState;
use crate::models::ApiResult;

/// Outcome of one reachability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PingResponse {
    /// Answered; `time` is the round trip in milliseconds.
    Alive { time: f64 },
    Failed,
}

/// Check whether a device answers an echo request.
///
/// GET /ping/:hostname
pub async fn ping_handler(
    State(state): State<ServerState>,
    Path(hostname): Path<String>,
) -> ApiResult<Json<PingResponse>> {
    let reply = state.pinger.ping(&hostname).await?;
    Ok(Json(match reply {
        Some(rtt) => PingResponse::Alive {
            time: round_trip_ms(rtt),
        },
        None => PingResponse::Failed,
    }))
}
