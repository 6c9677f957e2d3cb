//! Device reachability.
//!
//! A device is reachable when it answers an echo request within a timeout.
//! Hosts are given by name or address literal and resolved here, so a
//! [`HostPinger`] only deals in addresses it can actually reach.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PingError;

#[cfg(feature = "icmp")]
pub mod icmp;

#[cfg(feature = "icmp")]
pub use icmp::IcmpPinger;

/// Checks whether a host answers.
#[async_trait]
pub trait HostPinger: Send + Sync {
    /// Round-trip time to `host`, or `None` when it cannot be resolved or
    /// did not answer in time.
    async fn ping(&self, host: &str) -> Result<Option<Duration>, PingError>;
}

/// Resolve `host` to one address, preferring IPv4.
pub async fn resolve(host: &str) -> Option<IpAddr> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Some(addr);
    }
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .ok()?
        .map(|addr| addr.ip())
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

/// Round-trip time in milliseconds, rounded to two decimals.
pub fn round_trip_ms(rtt: Duration) -> f64 {
    (rtt.as_secs_f64() * 100_000.0).round() / 100.0
}
