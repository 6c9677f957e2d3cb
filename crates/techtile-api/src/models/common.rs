//! Success response wrapper.

use serde::Serialize;

/// Wrapper for successful responses.
///
/// ```json
/// { "success": true, "data": { ... } }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures are rendered by `ErrorResponse`.
    pub success: bool,

    /// Response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}
