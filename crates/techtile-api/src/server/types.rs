//! Shared server state.

use std::sync::Arc;

use techtile_control::{ControlPlane, HostPinger};

/// State shared by every handler.
#[derive(Clone)]
pub struct ServerState {
    pub control: Arc<ControlPlane>,
    /// Reachability checks behind `/ping`
    pub pinger: Arc<dyn HostPinger>,
    /// Server start time (Unix seconds)
    pub started_at: i64,
}

impl ServerState {
    pub fn new(control: Arc<ControlPlane>, pinger: Arc<dyn HostPinger>) -> Self {
        Self {
            control,
            pinger,
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        (chrono::Utc::now().timestamp() - self.started_at).max(0) as u64
    }
}
