//! Periodic rebroadcast of the experiment status.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::bus::{publish_json, BusClient};
use crate::scheduler::PeriodicJob;
use crate::status::StatusStore;

/// Publishes the current status snapshot to the status topic on every tick.
pub struct StatusMirror {
    store: Arc<dyn StatusStore>,
    bus: Arc<dyn BusClient>,
    topic: String,
    interval: Duration,
}

impl StatusMirror {
    pub fn new(
        store: Arc<dyn StatusStore>,
        bus: Arc<dyn BusClient>,
        topic: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            topic: topic.into(),
            interval,
        }
    }

    /// Publish once. Returns whether a snapshot was sent.
    pub async fn publish_once(&self) -> bool {
        let snapshot = match self.store.snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No status snapshot yet, skipping mirror tick");
                return false;
            }
            Err(e) => {
                warn!("Failed to read status: {}", e);
                return false;
            }
        };

        match publish_json(self.bus.as_ref(), &self.topic, &snapshot).await {
            Ok(()) => {
                debug!("Mirrored status {} to {}", snapshot.status.as_str(), self.topic);
                true
            }
            Err(e) => {
                warn!("Failed to publish status to {}: {}", self.topic, e);
                false
            }
        }
    }
}

#[async_trait]
impl PeriodicJob for StatusMirror {
    fn name(&self) -> &str {
        "status-mirror"
    }

    fn period(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) {
        self.publish_once().await;
    }
}
