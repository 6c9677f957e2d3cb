//! Command data structures.
//!
//! Defines the request identifiers, device identifiers, the allowed command
//! set and the wire payloads exchanged with devices.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ControlError;
use crate::topic::RESERVED_LEVELS;

/// Opaque request token correlating a command with its acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh 128-bit random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device identifier as it appears in topics.
///
/// Device ids are opaque, but they become a single topic level, so they must
/// be non-empty and free of `/` and the MQTT wildcards `+` and `#`. The
/// role levels `ack` and `confirm` are taken: a device with either name
/// would have its command topic land under the ack subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(value: impl Into<String>) -> Result<Self, ControlError> {
        let value = value.into();
        if value.is_empty()
            || value.contains(['/', '+', '#'])
            || RESERVED_LEVELS.contains(&value.as_str())
        {
            return Err(ControlError::InvalidDeviceId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of actions a device accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Shutdown,
    Reboot,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 2] = [ControlCommand::Shutdown, ControlCommand::Reboot];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Shutdown => "shutdown",
            ControlCommand::Reboot => "reboot",
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shutdown" => Ok(ControlCommand::Shutdown),
            "reboot" => Ok(ControlCommand::Reboot),
            other => Err(ControlError::UnsupportedCommand(other.to_string())),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatched command still waiting for its acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub device_id: DeviceId,
    pub command: ControlCommand,
    pub submitted_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(request_id: RequestId, device_id: DeviceId, command: ControlCommand) -> Self {
        Self {
            request_id,
            device_id,
            command,
            submitted_at: Utc::now(),
        }
    }

    /// Age of the request relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.submitted_at
    }

    /// Whether the request is strictly older than `bound` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, bound: Duration) -> bool {
        self.age(now) > bound
    }
}

/// Payload published on `control/<device_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub request_id: RequestId,
    pub command: ControlCommand,
}

/// Payload received on `control/ack/<device_id>`.
///
/// Devices may attach extra fields; only the request id is required.
#[derive(Debug, Clone, Deserialize)]
pub struct AckPayload {
    pub request_id: RequestId,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Payload published on `control/confirm/<device_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmPayload {
    pub request_id: RequestId,
}
