//! Unified error handling for the API.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use techtile_control::{ControlError, PingError, StatusError};

/// API error response with an HTTP status code.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// Bad request (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message, StatusCode::BAD_REQUEST)
    }

    /// Internal server error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

impl From<ControlError> for ErrorResponse {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::UnsupportedCommand(_) => {
                Self::new("UNSUPPORTED_COMMAND", e.to_string(), StatusCode::BAD_REQUEST)
            }
            ControlError::InvalidDeviceId(_) => {
                Self::new("INVALID_DEVICE_ID", e.to_string(), StatusCode::BAD_REQUEST)
            }
            ControlError::Bus(_) => Self::new(
                "BUS_UNAVAILABLE",
                e.to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        }
    }
}

impl From<StatusError> for ErrorResponse {
    fn from(e: StatusError) -> Self {
        Self::internal(format!("Status store error: {}", e))
    }
}

impl From<PingError> for ErrorResponse {
    fn from(e: PingError) -> Self {
        Self::new(
            "PING_ERROR",
            format!("Error while pinging: {}", e),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ErrorResponse>;

#[cfg(test)]
mod tests {
    use super::*;
    use techtile_control::BusError;

    #[test]
    fn test_control_error_mapping() {
        let err: ErrorResponse = ControlError::UnsupportedCommand("format_disk".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "UNSUPPORTED_COMMAND");

        let err: ErrorResponse = ControlError::InvalidDeviceId("a/b".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ErrorResponse =
            ControlError::Bus(BusError::Unavailable("queue full".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "BUS_UNAVAILABLE");
    }

    #[test]
    fn test_ping_error_mapping() {
        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err: ErrorResponse = PingError::Socket(io).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "PING_ERROR");
        assert!(err.message.starts_with("Error while pinging"));
    }
}
