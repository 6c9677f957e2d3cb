//! HTTP API for the Techtile control plane.
//!
//! Exposes command dispatch, the pending request listing and the
//! experiment status over a small axum router.

pub mod handlers;
pub mod models;
pub mod server;
pub mod shutdown;

pub use models::{ApiResponse, ApiResult, ErrorResponse};
pub use server::{ServerState, create_router_with_state, run};
