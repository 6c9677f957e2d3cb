//! Acknowledgment reconciliation.
//!
//! Devices answer each command on their ack topic. A matching ack closes the
//! pending request and is answered with a confirmation; anything else is
//! logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::bus::{publish_json, BusClient, BusMessage, MessageHandler};
use crate::command::{AckPayload, ConfirmPayload, DeviceId, RequestId};
use crate::error::AckError;
use crate::pending::PendingRequestTable;
use crate::topic::{TopicKey, TopicRole, Topics};

/// Result of reconciling one inbound ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The request was pending and is now closed.
    Confirmed {
        request_id: RequestId,
        device_id: DeviceId,
    },
    /// No pending entry: already acknowledged, expired, or never issued.
    Stale(RequestId),
}

/// Matches acks against the pending table and sends confirmations.
pub struct AckReconciler {
    pending: Arc<PendingRequestTable>,
    bus: Arc<dyn BusClient>,
    topics: Topics,
}

impl AckReconciler {
    pub fn new(pending: Arc<PendingRequestTable>, bus: Arc<dyn BusClient>, topics: Topics) -> Self {
        Self {
            pending,
            bus,
            topics,
        }
    }

    /// Reconcile a single ack message.
    pub async fn reconcile(&self, message: &BusMessage) -> Result<AckOutcome, AckError> {
        let payload: AckPayload = serde_json::from_slice(&message.payload)
            .map_err(|e| AckError::malformed(&message.topic, e.to_string()))?;
        let device_id = self.resolve_device(message, &payload)?;

        let Some(request) = self.pending.take(&payload.request_id) else {
            debug!(
                "Ignoring ack for unknown or expired request {} from {}",
                payload.request_id, device_id
            );
            return Ok(AckOutcome::Stale(payload.request_id));
        };

        info!(
            "Device {} acknowledged {} ({}) after {}ms",
            device_id,
            request.command,
            request.request_id,
            request.age(chrono::Utc::now()).num_milliseconds()
        );

        let topic = self.topics.render(&TopicKey::confirm(device_id.clone()));
        let confirm = ConfirmPayload {
            request_id: request.request_id.clone(),
        };
        // The entry stays removed; the device simply never sees a confirmation.
        if let Err(e) = publish_json(self.bus.as_ref(), &topic, &confirm).await {
            warn!("Failed to publish confirmation on {}: {}", topic, e);
        }

        Ok(AckOutcome::Confirmed {
            request_id: request.request_id,
            device_id,
        })
    }

    /// Prefer the device id carried in the payload, fall back to the topic suffix.
    fn resolve_device(
        &self,
        message: &BusMessage,
        payload: &AckPayload,
    ) -> Result<DeviceId, AckError> {
        if let Some(id) = payload.device_id.as_deref().filter(|id| !id.is_empty()) {
            return DeviceId::parse(id)
                .map_err(|e| AckError::malformed(&message.topic, e.to_string()));
        }
        match self.topics.parse(&message.topic) {
            Ok(TopicKey {
                role: TopicRole::Ack,
                device_id,
            }) => Ok(device_id),
            _ => Err(AckError::malformed(&message.topic, "no device id in payload or topic")),
        }
    }
}

#[async_trait]
impl MessageHandler for AckReconciler {
    async fn handle(&self, message: BusMessage) {
        if let Err(e) = self.reconcile(&message).await {
            warn!("{}", e);
        }
    }
}
