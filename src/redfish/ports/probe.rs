//! Network discovery port.

use crate::redfish::domain::DiscoveryRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for discovery probes.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// One network probe for advertised Redfish endpoints.
#[async_trait]
pub trait DiscoveryProbe: Send + Sync {
    /// Broadcasts a probe and returns the valid responses collected before
    /// the probe's timeout.
    async fn probe(&self) -> DiscoveryResult<Vec<DiscoveryRecord>>;
}

/// Errors returned by discovery probes.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The probe socket could not be opened or used.
    #[error("discovery socket error: {0}")]
    Socket(Arc<std::io::Error>),
}

impl DiscoveryError {
    /// Wraps a socket error.
    #[must_use]
    pub fn socket(err: std::io::Error) -> Self {
        Self::Socket(Arc::new(err))
    }
}
