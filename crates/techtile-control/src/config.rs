//! Control plane configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//! Every field has a default, so an empty or missing file is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::topic::Topics;

/// Environment variables that override file settings.
pub mod env_vars {
    pub const MQTT_BROKER: &str = "TECHTILE_MQTT_BROKER";
    pub const MQTT_PORT: &str = "TECHTILE_MQTT_PORT";
    pub const TOPIC_PREFIX: &str = "TECHTILE_TOPIC_PREFIX";
    pub const STATUS_FILE: &str = "TECHTILE_STATUS_FILE";
    pub const HTTP_PORT: &str = "TECHTILE_HTTP_PORT";
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// MQTT broker address
    #[serde(default = "default_broker")]
    pub broker: String,

    /// MQTT broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client ID (auto-generated if not provided)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_broker() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    60
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::new(default_broker())
    }
}

impl MqttConfig {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn full_broker_addr(&self) -> String {
        format!("{}:{}", self.broker, self.port)
    }

    pub(crate) fn resolved_client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("techtile-{}", Uuid::new_v4().simple()))
    }
}

/// Intervals driving the background jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Age after which an unacknowledged request is dropped
    pub expiry_secs: u64,
    /// How often the expiry sweeper runs
    pub sweep_interval_secs: u64,
    /// How often the status snapshot is rebroadcast
    pub status_interval_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            expiry_secs: 60,
            sweep_interval_secs: 30,
            status_interval_secs: 10,
        }
    }
}

impl TimingConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from browser dashboards
    pub cors: bool,
    /// How long a reachability check waits for an echo reply
    pub ping_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors: true,
            ping_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

/// Complete configuration of a control plane process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub status_file: PathBuf,
    pub mqtt: MqttConfig,
    pub topics: Topics,
    pub timing: TimingConfig,
    pub server: ServerConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            status_file: PathBuf::from("status.json"),
            mqtt: MqttConfig::default(),
            topics: Topics::default(),
            timing: TimingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: ControlConfig = toml::from_str(content)?;
        config.topics = Topics::default()
            .with_prefix(config.topics.prefix)
            .with_status_topic(config.topics.status_topic);
        Ok(config)
    }

    /// Load from `path` if it exists, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                        path: path.display().to_string(),
                        source,
                    })?;
                Self::from_toml(&content)?
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key/value source. Unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(broker) = lookup(env_vars::MQTT_BROKER) {
            self.mqtt.broker = broker;
        }
        if let Some(port) = lookup(env_vars::MQTT_PORT).and_then(|s| s.parse().ok()) {
            self.mqtt.port = port;
        }
        if let Some(prefix) = lookup(env_vars::TOPIC_PREFIX) {
            self.topics = self.topics.clone().with_prefix(prefix);
        }
        if let Some(path) = lookup(env_vars::STATUS_FILE) {
            self.status_file = PathBuf::from(path);
        }
        if let Some(port) = lookup(env_vars::HTTP_PORT).and_then(|s| s.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Reject settings the control plane cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;
        if timing.expiry_secs == 0 {
            return Err(ConfigError::Invalid("timing.expiry_secs must be positive".into()));
        }
        if timing.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "timing.sweep_interval_secs must be positive".into(),
            ));
        }
        if timing.status_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "timing.status_interval_secs must be positive".into(),
            ));
        }
        if self.server.ping_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.ping_timeout_secs must be positive".into(),
            ));
        }
        if self.topics.status_topic.is_empty() || self.topics.status_topic.contains(['+', '#']) {
            return Err(ConfigError::Invalid(format!(
                "topics.status_topic {:?} is not a publishable topic",
                self.topics.status_topic
            )));
        }
        if self.topics.prefix.contains(['+', '#']) {
            return Err(ConfigError::Invalid(format!(
                "topics.prefix {:?} contains wildcards",
                self.topics.prefix
            )));
        }
        if timing.expiry_secs < timing.sweep_interval_secs {
            warn!(
                "Expiry ({}s) is below the sweep interval ({}s); requests may live {}s",
                timing.expiry_secs,
                timing.sweep_interval_secs,
                timing.expiry_secs + timing.sweep_interval_secs
            );
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_mqtt_config_builder() {
        let config = MqttConfig::new("10.128.48.5")
            .with_port(1884)
            .with_auth("user", "secret")
            .with_client_id("bridge-1");
        assert_eq!(config.full_broker_addr(), "10.128.48.5:1884");
        assert_eq!(config.resolved_client_id(), "bridge-1");
        assert_eq!(config.username.as_deref(), Some("user"));
    }

    #[test]
    fn test_generated_client_ids_differ() {
        let config = MqttConfig::default();
        assert_ne!(config.resolved_client_id(), config.resolved_client_id());
        assert!(config.resolved_client_id().starts_with("techtile-"));
    }

    #[test]
    fn test_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.timing.expiry_secs, 60);
        assert_eq!(config.timing.sweep_interval_secs, 30);
        assert_eq!(config.timing.status_interval_secs, 10);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.topics.status_topic, "experiment");
        assert!(config.topics.prefix.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = ControlConfig::from_toml(
            r#"
            status_file = "/var/lib/techtile/status.json"

            [mqtt]
            broker = "10.128.48.5"

            [topics]
            prefix = "/rpi/"

            [timing]
            expiry_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.broker, "10.128.48.5");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.topics.prefix, "rpi");
        assert_eq!(config.timing.expiry_secs, 120);
        assert_eq!(config.timing.sweep_interval_secs, 30);
        assert_eq!(config.server.ping_timeout(), Duration::from_secs(10));
        assert_eq!(config.status_file, PathBuf::from("/var/lib/techtile/status.json"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (env_vars::MQTT_BROKER, "broker.lab"),
            (env_vars::MQTT_PORT, "8883"),
            (env_vars::HTTP_PORT, "not-a-port"),
            (env_vars::TOPIC_PREFIX, "rpi"),
        ]);
        let mut config = ControlConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mqtt.broker, "broker.lab");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.topics.prefix, "rpi");
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = ControlConfig::default();
        config.timing.sweep_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ControlConfig::default();
        config.topics.status_topic = "experiment/#".to_string();
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.server.ping_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_render_and_reparse() {
        let mut config = ControlConfig::default();
        config.topics = config.topics.with_prefix("rpi");
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[timing]"));
        assert_eq!(ControlConfig::from_toml(&rendered).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = ControlConfig::load(Some(&path)).unwrap();
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("techtile.toml");
        std::fs::write(&path, "[timing\nexpiry_secs = ").unwrap();
        assert!(matches!(
            ControlConfig::load(Some(&path)),
            Err(ConfigError::Parse(_))
        ));
    }
}
