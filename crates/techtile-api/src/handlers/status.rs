//! Experiment status handlers.

use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use techtile_control::{StatusSnapshot, StatusUpdate};

use super::ServerState;
use crate::models::{ApiResponse, ApiResult, ErrorResponse};

/// Current status, or the inactive default when none was ever set.
///
/// GET /status
pub async fn get_status_handler(
    State(state): State<ServerState>,
) -> ApiResult<Json<StatusSnapshot>> {
    let snapshot = state.control.status_store().snapshot().await?;
    Ok(Json(snapshot.unwrap_or_default()))
}

/// Replace the status. Unknown status values are stored as inactive.
///
/// POST /status
pub async fn update_status_handler(
    State(state): State<ServerState>,
    body: Bytes,
) -> ApiResult<Json<ApiResponse<StatusSnapshot>>> {
    let update = parse_update(&body)?;
    let snapshot = update.normalize();

    state
        .control
        .status_store()
        .update(snapshot.clone())
        .await?;
    tracing::info!(
        "Experiment status set to {} ({:?})",
        snapshot.status.as_str(),
        snapshot.message
    );
    Ok(Json(ApiResponse::success(snapshot)))
}

fn parse_update(body: &[u8]) -> ApiResult<StatusUpdate> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ErrorResponse::bad_request("No data provided"));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ErrorResponse::bad_request(format!("Invalid JSON body: {}", e)))?;
    let has_fields = match &value {
        Value::Object(map) => !map.is_empty(),
        _ => return Err(ErrorResponse::bad_request("Status update must be a JSON object")),
    };
    if !has_fields {
        return Err(ErrorResponse::bad_request("No data provided"));
    }
    serde_json::from_value(value)
        .map_err(|e| ErrorResponse::bad_request(format!("Invalid status update: {}", e)))
}
