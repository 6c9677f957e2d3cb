//! Command dispatch.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bus::{publish_json, BusClient};
use crate::command::{CommandPayload, ControlCommand, DeviceId, PendingRequest, RequestId};
use crate::error::ControlResult;
use crate::pending::PendingRequestTable;
use crate::topic::{TopicKey, Topics};

/// Turns a control request into a tracked command publish.
pub struct Dispatcher {
    pending: Arc<PendingRequestTable>,
    bus: Arc<dyn BusClient>,
    topics: Topics,
}

impl Dispatcher {
    pub fn new(pending: Arc<PendingRequestTable>, bus: Arc<dyn BusClient>, topics: Topics) -> Self {
        Self {
            pending,
            bus,
            topics,
        }
    }

    /// Validate, record and publish a command for `device_id`.
    ///
    /// The request is tracked before it is published so an ack can never
    /// outrun its own table entry. Returns as soon as the bus accepted the
    /// message; acknowledgment is reconciled asynchronously.
    pub async fn dispatch(&self, device_id: &str, action: &str) -> ControlResult<RequestId> {
        let command: ControlCommand = action.parse()?;
        let device_id = DeviceId::parse(device_id)?;

        let request = PendingRequest::new(RequestId::generate(), device_id.clone(), command);
        let request_id = request.request_id.clone();
        self.pending.insert(request);

        let topic = self.topics.render(&TopicKey::command(device_id.clone()));
        let payload = CommandPayload {
            request_id: request_id.clone(),
            command,
        };

        if let Err(e) = publish_json(self.bus.as_ref(), &topic, &payload).await {
            self.pending.take(&request_id);
            warn!("Dispatch of {} to {} failed: {}", command, device_id, e);
            return Err(e.into());
        }

        info!("Dispatched {} to {} ({})", command, device_id, request_id);
        Ok(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::error::{BusError, ControlError};

    fn dispatcher() -> (Arc<PendingRequestTable>, Arc<MemoryBus>, Dispatcher) {
        let pending = Arc::new(PendingRequestTable::new());
        let bus = Arc::new(MemoryBus::new());
        let dispatcher = Dispatcher::new(pending.clone(), bus.clone(), Topics::default());
        (pending, bus, dispatcher)
    }

    #[tokio::test]
    async fn test_dispatch_publishes_payload() {
        let (pending, bus, dispatcher) = dispatcher();
        let id = dispatcher.dispatch("rpi-1", "shutdown").await.unwrap();

        let entry = pending.get(&id).expect("tracked");
        assert_eq!(entry.command, ControlCommand::Shutdown);

        let sent = bus.published_on("control/rpi-1").await;
        assert_eq!(sent.len(), 1);
        let payload: CommandPayload = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(payload.request_id, id);
        assert_eq!(payload.command, ControlCommand::Shutdown);
    }

    #[tokio::test]
    async fn test_unsupported_command_has_no_side_effect() {
        let (pending, bus, dispatcher) = dispatcher();
        let err = dispatcher.dispatch("rpi-1", "format_disk").await.unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedCommand(ref c) if c == "format_disk"));
        assert!(pending.is_empty());
        assert!(bus.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_device_has_no_side_effect() {
        let (pending, bus, dispatcher) = dispatcher();
        for device in ["", "rpi/1", "rpi+", "#", "ack", "confirm"] {
            let err = dispatcher.dispatch(device, "reboot").await.unwrap_err();
            assert!(matches!(err, ControlError::InvalidDeviceId(_)));
        }
        assert!(pending.is_empty());
        assert!(bus.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_rolls_back() {
        let (pending, bus, dispatcher) = dispatcher();
        bus.set_available(false);

        let err = dispatcher.dispatch("rpi-1", "reboot").await.unwrap_err();
        assert!(matches!(err, ControlError::Bus(BusError::Unavailable(_))));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_prefixed_topics() {
        let pending = Arc::new(PendingRequestTable::new());
        let bus = Arc::new(MemoryBus::new());
        let topics = Topics::default().with_prefix("rpi");
        let dispatcher = Dispatcher::new(pending, bus.clone(), topics);

        dispatcher.dispatch("node-3", "reboot").await.unwrap();
        assert_eq!(bus.published_on("rpi/control/node-3").await.len(), 1);
    }
}
