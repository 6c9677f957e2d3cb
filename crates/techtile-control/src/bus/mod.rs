//! Publish/subscribe bus abstraction.
//!
//! The control plane only needs two operations from a transport:
//! fire-and-forget `publish` and `subscribe` with a handler. Delivery is
//! at-most-once; ordering is only guaranteed within one topic on one
//! connection.
//!
//! | Implementation | Use |
//! |---|---|
//! | [`MqttBus`] | Production transport over an MQTT broker |
//! | [`MemoryBus`] | In-process loopback for tests and embedded setups |

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{BusError, BusResult};

pub mod memory;
#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use memory::MemoryBus;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttBus;

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Handler invoked for every message matching a subscription.
///
/// Handlers run on the transport's receive path and are awaited to
/// completion before the next message is delivered.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: BusMessage);
}

/// Publish/subscribe transport.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Hand a message to the transport without waiting for delivery.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Register a handler for every topic matching `filter`.
    ///
    /// Implementations keep the registration across reconnects.
    async fn subscribe(&self, filter: &str, handler: Arc<dyn MessageHandler>) -> BusResult<()>;
}

/// Serialize `value` as JSON and publish it.
pub async fn publish_json<T: Serialize + ?Sized>(
    bus: &dyn BusClient,
    topic: &str,
    value: &T,
) -> BusResult<()> {
    let payload = serde_json::to_vec(value).map_err(BusError::Serialization)?;
    bus.publish(topic, payload).await
}
