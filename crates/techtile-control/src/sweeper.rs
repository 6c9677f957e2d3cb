//! Expiry of unacknowledged requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::command::PendingRequest;
use crate::pending::PendingRequestTable;
use crate::scheduler::PeriodicJob;

/// Drops pending requests that outlived the expiry bound.
///
/// Expiry is silent towards devices: no confirmation and no retry.
pub struct ExpirySweeper {
    pending: Arc<PendingRequestTable>,
    expiry: chrono::Duration,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(pending: Arc<PendingRequestTable>, expiry: Duration, interval: Duration) -> Self {
        Self {
            pending,
            expiry: chrono::Duration::from_std(expiry)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
            interval,
        }
    }

    /// Remove everything expired as of `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<PendingRequest> {
        let expired = self.pending.remove_expired(now, self.expiry);
        for request in &expired {
            info!(
                "Request {} ({} to {}) timed out after {}s without ack",
                request.request_id,
                request.command,
                request.device_id,
                request.age(now).num_seconds()
            );
        }
        expired
    }

    pub fn sweep(&self) -> Vec<PendingRequest> {
        self.sweep_at(Utc::now())
    }
}

#[async_trait]
impl PeriodicJob for ExpirySweeper {
    fn name(&self) -> &str {
        "expiry-sweeper"
    }

    fn period(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) {
        self.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ControlCommand, DeviceId, RequestId};

    #[test]
    fn test_expiry_boundary_is_strict() {
        let pending = Arc::new(PendingRequestTable::new());
        let request = PendingRequest::new(
            RequestId::generate(),
            DeviceId::parse("rpi-1").unwrap(),
            ControlCommand::Reboot,
        );
        let submitted = request.submitted_at;
        pending.insert(request);

        let sweeper =
            ExpirySweeper::new(pending.clone(), Duration::from_secs(60), Duration::from_secs(30));

        assert!(sweeper.sweep_at(submitted + chrono::Duration::seconds(60)).is_empty());
        assert_eq!(pending.len(), 1);

        let expired = sweeper.sweep_at(submitted + chrono::Duration::seconds(61));
        assert_eq!(expired.len(), 1);
        assert!(pending.is_empty());
    }
}
