//! Command dispatch handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use techtile_control::{ControlCommand, PendingRequest};

use super::ServerState;
use crate::models::{ApiResponse, ApiResult};

/// Response to a dispatched command.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    pub request_id: String,
}

/// In-flight request as shown to operators.
#[derive(Debug, Clone, Serialize)]
pub struct PendingView {
    pub request_id: String,
    pub device_id: String,
    pub command: ControlCommand,
    pub submitted_at: DateTime<Utc>,
    pub age_secs: i64,
}

impl PendingView {
    fn from_request(request: PendingRequest, now: DateTime<Utc>) -> Self {
        Self {
            age_secs: request.age(now).num_seconds(),
            request_id: request.request_id.to_string(),
            device_id: request.device_id.to_string(),
            command: request.command,
            submitted_at: request.submitted_at,
        }
    }
}

/// Dispatch `command` to `device_id`.
///
/// POST /control/:device_id/:command
pub async fn dispatch_handler(
    State(state): State<ServerState>,
    Path((device_id, command)): Path<(String, String)>,
) -> ApiResult<Json<DispatchResponse>> {
    let request_id = state.control.dispatch(&device_id, &command).await?;
    Ok(Json(DispatchResponse {
        success: true,
        request_id: request_id.to_string(),
    }))
}

/// List requests still waiting for an ack, oldest first.
///
/// GET /control/pending
pub async fn list_pending_handler(
    State(state): State<ServerState>,
) -> Json<ApiResponse<Vec<PendingView>>> {
    let now = Utc::now();
    let pending = state
        .control
        .pending()
        .list()
        .into_iter()
        .map(|request| PendingView::from_request(request, now))
        .collect();
    Json(ApiResponse::success(pending))
}
