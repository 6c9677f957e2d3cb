//! Application router configuration.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use super::types::ServerState;
use crate::handlers::{basic, control, ping, status};

/// Create the application router with a specific state.
pub fn create_router_with_state(state: ServerState, cors: bool) -> Router {
    let router = Router::new()
        .route("/api/health", get(basic::health_handler))
        .route("/api/health/status", get(basic::health_status_handler))
        .route("/control/pending", get(control::list_pending_handler))
        .route("/control/:device_id/:command", post(control::dispatch_handler))
        .route("/ping/:hostname", get(ping::ping_handler))
        .route(
            "/status",
            get(status::get_status_handler).post(status::update_status_handler),
        )
        .with_state(state);

    if cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}
