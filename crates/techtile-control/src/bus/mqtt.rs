//! MQTT transport for the control bus.
//!
//! Wraps a single `rumqttc` connection. The event loop runs on one task and
//! awaits each subscription handler before polling the next packet, so acks
//! from one connection are reconciled in arrival order. Every registered
//! filter is re-subscribed on each `ConnAck`, which keeps subscriptions alive
//! across broker restarts and network drops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{BusClient, BusMessage, MessageHandler};
use crate::config::MqttConfig;
use crate::error::{BusError, BusResult};
use crate::topic::{topic_matches, validate_filter};

/// Outstanding requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(
        config.resolved_client_id(),
        config.broker.clone(),
        config.port,
    );
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    options.set_clean_session(true);
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }
    options
}

type Subscriptions = Arc<RwLock<Vec<(String, Arc<dyn MessageHandler>)>>>;

/// Bus client backed by an MQTT broker.
pub struct MqttBus {
    client: AsyncClient,
    broker_addr: String,
    subscriptions: Subscriptions,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttBus {
    /// Create the client and spawn its event loop.
    ///
    /// The connection is established in the background; publishes made
    /// before the first `ConnAck` are queued by the client.
    pub fn connect(config: &MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
        let subscriptions: Subscriptions = Arc::new(RwLock::new(Vec::new()));
        let connected = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let broker_addr = config.full_broker_addr();

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            subscriptions.clone(),
            connected.clone(),
            running.clone(),
            broker_addr.clone(),
        ));

        info!("MQTT bus connecting to {}", broker_addr);
        Self {
            client,
            broker_addr,
            subscriptions,
            connected,
            running,
            task: Mutex::new(Some(handle)),
        }
    }

    pub fn broker_addr(&self) -> &str {
        &self.broker_addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Stop the event loop and close the connection.
    pub async fn disconnect(&self) {
        self.running.store(false, Ordering::Relaxed);
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect request not sent: {}", e);
        }
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::Relaxed);
        info!("MQTT bus to {} closed", self.broker_addr);
    }
}

#[async_trait]
impl BusClient for MqttBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BusResult<()> {
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| BusError::Unavailable(format!("publish on {} failed: {}", topic, e)))
    }

    async fn subscribe(&self, filter: &str, handler: Arc<dyn MessageHandler>) -> BusResult<()> {
        validate_filter(filter)?;
        self.subscriptions
            .write()
            .await
            .push((filter.to_string(), handler));

        // Otherwise the next ConnAck subscribes it.
        if self.is_connected() {
            self.client
                .try_subscribe(filter, QoS::AtMostOnce)
                .map_err(|e| BusError::Unavailable(format!("subscribe {} failed: {}", filter, e)))?;
        }
        info!("Subscribed to {} on {}", filter, self.broker_addr);
        Ok(())
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Subscriptions,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    broker_addr: String,
) {
    while running.load(Ordering::Relaxed) {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
                info!("MQTT broker {} connection acknowledged", broker_addr);
                resubscribe(&client, &subscriptions).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let topic = String::from_utf8_lossy(publish.topic.as_ref()).into_owned();
                let message = BusMessage::new(topic, publish.payload.to_vec());
                dispatch_to_handlers(&subscriptions, message).await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Relaxed);
                warn!("MQTT broker {} sent disconnect", broker_addr);
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::Relaxed) {
                    error!("MQTT connection to {} lost: {}", broker_addr, e);
                } else {
                    warn!("MQTT broker {} unreachable: {}", broker_addr, e);
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    debug!("MQTT event loop for {} stopped", broker_addr);
}

async fn resubscribe(client: &AsyncClient, subscriptions: &Subscriptions) {
    for (filter, _) in subscriptions.read().await.iter() {
        match client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
            Ok(()) => debug!("Re-subscribed to {}", filter),
            Err(e) => warn!("Failed to re-subscribe to {}: {}", filter, e),
        }
    }
}

async fn dispatch_to_handlers(subscriptions: &Subscriptions, message: BusMessage) {
    let handlers: Vec<Arc<dyn MessageHandler>> = subscriptions
        .read()
        .await
        .iter()
        .filter(|(filter, _)| topic_matches(filter, &message.topic))
        .map(|(_, handler)| handler.clone())
        .collect();

    if handlers.is_empty() {
        debug!("No handler for MQTT message on {}", message.topic);
    }
    for handler in handlers {
        handler.handle(message.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = MqttConfig::new("10.128.48.5")
            .with_port(1884)
            .with_client_id("bridge-1");
        let options = mqtt_options(&config);
        assert_eq!(options.broker_address(), ("10.128.48.5".to_string(), 1884));
        assert_eq!(options.client_id(), "bridge-1");
    }

    #[test]
    fn test_keep_alive_floor() {
        let mut config = MqttConfig::default();
        config.keep_alive_secs = 1;
        assert_eq!(mqtt_options(&config).keep_alive(), Duration::from_secs(5));
    }
}
