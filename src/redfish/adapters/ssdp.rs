//! SSDP discovery probe on a UDP socket.

use crate::redfish::{
    domain::{
        DiscoveryRecord, HostAddress,
        discovery::{SSDP_MULTICAST_ADDR, m_search_request, parse_ssdp_response},
    },
    ports::{DiscoveryError, DiscoveryProbe, DiscoveryResult},
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

/// Default time spent collecting responses per probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const RECEIVE_BUFFER_SIZE: usize = 4096;
const MULTICAST_TTL: u32 = 2;

/// Sends an SSDP `M-SEARCH` and collects Redfish service advertisements.
#[derive(Debug, Clone, Copy)]
pub struct SsdpProbe {
    timeout: Duration,
    target: SocketAddr,
}

impl SsdpProbe {
    /// Creates a probe addressing the SSDP multicast group.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            target: SSDP_MULTICAST_ADDR,
        }
    }

    /// Sends the search to `target` instead of the multicast group.
    #[must_use]
    pub const fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }
}

impl Default for SsdpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl DiscoveryProbe for SsdpProbe {
    async fn probe(&self) -> DiscoveryResult<Vec<DiscoveryRecord>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(DiscoveryError::socket)?;
        if self.target.ip().is_multicast() {
            socket
                .set_multicast_ttl_v4(MULTICAST_TTL)
                .map_err(DiscoveryError::socket)?;
        }
        socket
            .send_to(m_search_request().as_bytes(), self.target)
            .await
            .map_err(DiscoveryError::socket)?;

        let deadline = Instant::now() + self.timeout;
        let mut buffer = vec![0_u8; RECEIVE_BUFFER_SIZE];
        let mut responses = Responses::default();

        while let Ok(received) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buffer)).await {
            responses.accept(received.map(|(length, source)| (buffer.get(..length).unwrap_or_default(), source)));
        }
        Ok(responses.into_records())
    }
}

/// Advertisements collected during one probe, one per host.
#[derive(Debug, Default)]
struct Responses {
    seen: HashSet<HostAddress>,
    records: Vec<DiscoveryRecord>,
}

impl Responses {
    /// Keeps the first valid advertisement per host; receive errors and
    /// malformed datagrams are skipped.
    fn accept(&mut self, received: io::Result<(&[u8], SocketAddr)>) {
        let (datagram, source) = match received {
            Ok(datagram) => datagram,
            Err(err) => {
                debug!(error = %err, "SSDP receive failed, still listening");
                return;
            }
        };
        let payload = String::from_utf8_lossy(datagram);
        match parse_ssdp_response(&payload, source.ip()) {
            Ok(record) => {
                if self.seen.insert(record.address().clone()) {
                    self.records.push(record);
                }
            }
            Err(err) => debug!(%source, error = %err, "ignoring SSDP response"),
        }
    }

    fn into_records(self) -> Vec<DiscoveryRecord> {
        self.records
    }
}
