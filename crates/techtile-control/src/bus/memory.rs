//! In-process loopback bus.
//!
//! Published messages are recorded and delivered to every matching local
//! subscription, in subscription order, before `publish` returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BusClient, BusMessage, MessageHandler};
use crate::error::{BusError, BusResult};
use crate::topic::{topic_matches, validate_filter};

/// Loopback bus that keeps a log of everything published.
pub struct MemoryBus {
    published: RwLock<Vec<BusMessage>>,
    subscriptions: RwLock<Vec<(String, Arc<dyn MessageHandler>)>>,
    available: AtomicBool,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the transport going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Inject an inbound message as if it arrived from the broker.
    ///
    /// Returns the number of handlers that received it.
    pub async fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        let message = BusMessage::new(topic, payload);
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler.handle(message.clone()).await;
        }
        handlers.len()
    }

    /// Everything published so far, oldest first.
    pub async fn published(&self) -> Vec<BusMessage> {
        self.published.read().await.clone()
    }

    /// Messages published on exactly `topic`.
    pub async fn published_on(&self, topic: &str) -> Vec<BusMessage> {
        self.published
            .read()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[async_trait]
impl BusClient for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("memory bus is offline".to_string()));
        }
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }

        debug!("memory bus publish on {} ({} bytes)", topic, payload.len());
        self.published
            .write()
            .await
            .push(BusMessage::new(topic, payload.clone()));
        self.deliver(topic, payload).await;
        Ok(())
    }

    async fn subscribe(&self, filter: &str, handler: Arc<dyn MessageHandler>) -> BusResult<()> {
        validate_filter(filter)?;
        self.subscriptions
            .write()
            .await
            .push((filter.to_string(), handler));
        Ok(())
    }
}
