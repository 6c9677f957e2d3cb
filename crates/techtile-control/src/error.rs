//! Error types for the control plane.

use thiserror::Error;

/// Result type for dispatch operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors surfaced synchronously to callers of the dispatcher.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested action is not part of the allowed command set.
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// The device identifier cannot be embedded in a topic.
    #[error("Invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// Publishing the command failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Errors raised by a bus client.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport could not accept the message.
    #[error("Bus unavailable: {0}")]
    Unavailable(String),

    /// Topic or filter rejected at the bus boundary.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons an inbound acknowledgment is discarded as malformed.
#[derive(Debug, Error)]
pub enum AckError {
    #[error("Malformed ack payload on {topic}: {reason}")]
    Malformed { topic: String, reason: String },
}

impl AckError {
    pub(crate) fn malformed(topic: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Status store errors.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Status file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Status file is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Reachability check errors.
///
/// An unreachable host is not an error; this covers failing to check at all.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("Cannot open ICMP socket: {0}")]
    Socket(#[source] std::io::Error),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
