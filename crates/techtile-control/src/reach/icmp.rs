//! ICMP echo pinger.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tracing::debug;
use uuid::Uuid;

use super::{HostPinger, resolve};
use crate::error::PingError;

const PAYLOAD: [u8; 56] = [0; 56];

/// Sends one echo request per check.
///
/// A socket is opened per check, so missing ICMP permissions surface on the
/// request that needed them instead of at startup.
#[derive(Debug, Clone)]
pub struct IcmpPinger {
    timeout: Duration,
}

impl IcmpPinger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HostPinger for IcmpPinger {
    async fn ping(&self, host: &str) -> Result<Option<Duration>, PingError> {
        let Some(addr) = resolve(host).await else {
            debug!("Cannot resolve {}", host);
            return Ok(None);
        };

        let config = match addr {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config).map_err(PingError::Socket)?;

        let id = Uuid::new_v4();
        let ident = u16::from_le_bytes([id.as_bytes()[0], id.as_bytes()[1]]);
        let mut pinger = client.pinger(addr, PingIdentifier(ident)).await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok((_, rtt)) => Ok(Some(rtt)),
            Err(SurgeError::Timeout { .. }) => {
                debug!("No echo reply from {} ({}) within {:?}", host, addr, self.timeout);
                Ok(None)
            }
            Err(e) => {
                debug!("Echo to {} ({}) failed: {}", host, addr, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        let pinger = IcmpPinger::new(Duration::from_secs(1));
        assert_eq!(pinger.ping("no such host!").await.unwrap(), None);
        assert_eq!(pinger.timeout(), Duration::from_secs(1));
    }
}
