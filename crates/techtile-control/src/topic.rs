//! Topic layout for the control protocol.
//!
//! ## Topic Format
//!
//! ```text
//! [prefix/]control/{device_id}           command     (outbound)
//! [prefix/]control/ack/{device_id}       ack         (inbound)
//! [prefix/]control/confirm/{device_id}   confirm     (outbound)
//! {status_topic}                         status      (outbound, periodic)
//! ```
//!
//! Device topics are built from a structured [`TopicKey`] instead of string
//! concatenation, and inbound topics are parsed back into one at the bus
//! boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::DeviceId;
use crate::error::BusError;

const CONTROL: &str = "control";
const ACK: &str = "ack";
const CONFIRM: &str = "confirm";

/// Levels under `control/` that name a role, so no device may take them.
pub(crate) const RESERVED_LEVELS: [&str; 2] = [ACK, CONFIRM];

/// The role a per-device topic plays in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicRole {
    Command,
    Ack,
    Confirm,
}

/// A per-device topic as a structured key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicKey {
    pub role: TopicRole,
    pub device_id: DeviceId,
}

impl TopicKey {
    pub fn command(device_id: DeviceId) -> Self {
        Self {
            role: TopicRole::Command,
            device_id,
        }
    }

    pub fn ack(device_id: DeviceId) -> Self {
        Self {
            role: TopicRole::Ack,
            device_id,
        }
    }

    pub fn confirm(device_id: DeviceId) -> Self {
        Self {
            role: TopicRole::Confirm,
            device_id,
        }
    }
}

/// Topic namespace used by one control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    /// Optional namespace prepended to every device topic (e.g. `rpi`).
    #[serde(default)]
    pub prefix: String,
    /// Fixed topic the status snapshot is mirrored to.
    #[serde(default = "default_status_topic")]
    pub status_topic: String,
}

fn default_status_topic() -> String {
    "experiment".to_string()
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            status_topic: default_status_topic(),
        }
    }
}

impl Topics {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn with_status_topic(mut self, topic: impl Into<String>) -> Self {
        self.status_topic = topic.into();
        self
    }

    fn root(&self) -> String {
        if self.prefix.is_empty() {
            CONTROL.to_string()
        } else {
            format!("{}/{}", self.prefix, CONTROL)
        }
    }

    /// Render a structured key into its topic string.
    pub fn render(&self, key: &TopicKey) -> String {
        match key.role {
            TopicRole::Command => format!("{}/{}", self.root(), key.device_id),
            TopicRole::Ack => format!("{}/{}/{}", self.root(), ACK, key.device_id),
            TopicRole::Confirm => format!("{}/{}/{}", self.root(), CONFIRM, key.device_id),
        }
    }

    /// Subscription filter matching every device's ack topic.
    pub fn ack_filter(&self) -> String {
        format!("{}/{}/#", self.root(), ACK)
    }

    /// Parse an inbound topic back into a structured key.
    pub fn parse(&self, topic: &str) -> Result<TopicKey, BusError> {
        let invalid = || BusError::InvalidTopic(topic.to_string());

        let rest = topic
            .strip_prefix(&self.root())
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(invalid)?;

        let parts: Vec<&str> = rest.split('/').collect();
        let (role, device) = match parts.as_slice() {
            [ACK, device] => (TopicRole::Ack, *device),
            [CONFIRM, device] => (TopicRole::Confirm, *device),
            [device] => (TopicRole::Command, *device),
            _ => return Err(invalid()),
        };

        let device_id = DeviceId::parse(device).map_err(|_| invalid())?;
        Ok(TopicKey { role, device_id })
    }
}

impl fmt::Display for Topics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/* (status: {})", self.root(), self.status_topic)
    }
}

/// Match a concrete topic against an MQTT subscription filter.
///
/// `+` matches exactly one level and `#` matches the remaining levels,
/// including none.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Check that a filter is well-formed before it reaches the transport.
pub fn validate_filter(filter: &str) -> Result<(), BusError> {
    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        let bad_hash = level.contains('#') && (*level != "#" || i != last);
        let bad_plus = level.contains('+') && *level != "+";
        if bad_hash || bad_plus {
            return Err(BusError::InvalidTopic(filter.to_string()));
        }
    }
    if filter.is_empty() {
        return Err(BusError::InvalidTopic(filter.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> DeviceId {
        DeviceId::parse(id).unwrap()
    }

    #[test]
    fn test_render_default_layout() {
        let topics = Topics::default();
        assert_eq!(topics.render(&TopicKey::command(device("rpi-1"))), "control/rpi-1");
        assert_eq!(topics.render(&TopicKey::ack(device("rpi-1"))), "control/ack/rpi-1");
        assert_eq!(
            topics.render(&TopicKey::confirm(device("rpi-1"))),
            "control/confirm/rpi-1"
        );
        assert_eq!(topics.ack_filter(), "control/ack/#");
        assert_eq!(topics.status_topic, "experiment");
    }

    #[test]
    fn test_render_with_prefix() {
        let topics = Topics::default().with_prefix("rpi/");
        assert_eq!(topics.render(&TopicKey::command(device("n7"))), "rpi/control/n7");
        assert_eq!(topics.ack_filter(), "rpi/control/ack/#");
    }

    #[test]
    fn test_parse_roundtrip_roles() {
        let topics = Topics::default().with_prefix("rpi");
        let key = topics.parse("rpi/control/ack/rpi-1").unwrap();
        assert_eq!(key, TopicKey::ack(device("rpi-1")));

        let key = topics.parse("rpi/control/confirm/x").unwrap();
        assert_eq!(key.role, TopicRole::Confirm);

        let key = topics.parse("rpi/control/x").unwrap();
        assert_eq!(key.role, TopicRole::Command);
    }

    #[test]
    fn test_parse_rejects_foreign_topics() {
        let topics = Topics::default();
        assert!(topics.parse("sensor/rpi-1/temp").is_err());
        assert!(topics.parse("control/ack").is_err());
        assert!(topics.parse("control/ack/").is_err());
        assert!(topics.parse("control/ack/a/b").is_err());
        assert!(topics.parse("controlx/ack/a").is_err());
    }

    #[test]
    fn test_every_device_topic_parses_back() {
        let topics = Topics::default().with_prefix("rpi");
        for id in ["rpi-1", "acks", "confirmed", "Ack"] {
            for key in [
                TopicKey::command(device(id)),
                TopicKey::ack(device(id)),
                TopicKey::confirm(device(id)),
            ] {
                let rendered = topics.render(&key);
                assert_eq!(topics.parse(&rendered).unwrap(), key, "{}", rendered);
            }
            // Only the device's own ack topic falls under the ack subscription
            let command = topics.render(&TopicKey::command(device(id)));
            assert!(!topic_matches(&topics.ack_filter(), &command));
        }
    }

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("control/ack/#", "control/ack/rpi-1"));
        assert!(topic_matches("control/ack/#", "control/ack"));
        assert!(topic_matches("control/+/rpi-1", "control/ack/rpi-1"));
        assert!(!topic_matches("control/+", "control/ack/rpi-1"));
        assert!(!topic_matches("control/ack/#", "control/confirm/rpi-1"));
        assert!(topic_matches("experiment", "experiment"));
        assert!(!topic_matches("experiment", "experiment/x"));
    }

    #[test]
    fn test_validate_filter() {
        assert!(validate_filter("control/ack/#").is_ok());
        assert!(validate_filter("control/+/x").is_ok());
        assert!(validate_filter("control/#/x").is_err());
        assert!(validate_filter("control/a+").is_err());
        assert!(validate_filter("").is_err());
    }
}
