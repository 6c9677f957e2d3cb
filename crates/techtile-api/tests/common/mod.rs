//! Shared test fixtures.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use techtile_api::ServerState;
use techtile_control::{
    ControlPlane, HostPinger, MemoryBus, MemoryStatusStore, PingError, TimingConfig, Topics,
};

/// Pinger with canned answers: `rpi-1` replies in 12.34 ms, `locked-down`
/// cannot be checked, anything else never answers.
pub struct CannedPinger;

#[async_trait]
impl HostPinger for CannedPinger {
    async fn ping(&self, host: &str) -> Result<Option<Duration>, PingError> {
        match host {
            "rpi-1" => Ok(Some(Duration::from_micros(12_340))),
            "locked-down" => Err(PingError::Socket(io::Error::from(
                io::ErrorKind::PermissionDenied,
            ))),
            _ => Ok(None),
        }
    }
}

/// Build server state over a memory bus and an empty memory status store.
pub async fn create_test_server_state() -> (Arc<MemoryBus>, ServerState) {
    let bus = Arc::new(MemoryBus::new());
    let status = Arc::new(MemoryStatusStore::new());
    let timing = TimingConfig::default();
    let control = ControlPlane::new(bus.clone(), status, Topics::default(), &timing);
    control.start().await.expect("start control plane");
    (bus, ServerState::new(Arc::new(control), Arc::new(CannedPinger)))
}
