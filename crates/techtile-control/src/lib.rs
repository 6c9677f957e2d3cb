//! Control plane for remote device commands.
//!
//! Provides:
//! - Command dispatch over a publish/subscribe bus
//! - Tracking of in-flight requests until acknowledged or expired
//! - Acknowledgment reconciliation and confirmations
//! - Periodic rebroadcast of the experiment status
//! - Device reachability checks over ICMP
//! - Bus transports (MQTT and in-memory) and configuration

pub mod ack;
pub mod bus;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mirror;
pub mod pending;
pub mod reach;
pub mod scheduler;
pub mod service;
pub mod status;
pub mod sweeper;
pub mod topic;

// Re-exports
pub use ack::{AckOutcome, AckReconciler};

pub use bus::{BusClient, BusMessage, MemoryBus, MessageHandler};
#[cfg(feature = "mqtt")]
pub use bus::MqttBus;

pub use command::{
    AckPayload, CommandPayload, ConfirmPayload, ControlCommand, DeviceId, PendingRequest,
    RequestId,
};

pub use config::{ControlConfig, MqttConfig, ServerConfig, TimingConfig};

pub use dispatcher::Dispatcher;

pub use error::{
    AckError, BusError, BusResult, ConfigError, ControlError, ControlResult, PingError,
    StatusError,
};

pub use mirror::StatusMirror;
pub use pending::PendingRequestTable;

pub use reach::{HostPinger, round_trip_ms};
#[cfg(feature = "icmp")]
pub use reach::IcmpPinger;

pub use scheduler::{PeriodicJob, Scheduler};
pub use service::ControlPlane;
pub use sweeper::ExpirySweeper;

pub use status::{
    ExperimentStatus, FileStatusStore, MemoryStatusStore, StatusSnapshot, StatusStore,
    StatusUpdate,
};

pub use topic::{TopicKey, TopicRole, Topics};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
