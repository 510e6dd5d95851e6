//! Wire-client port for Redfish hosts.

use crate::redfish::domain::{AuthToken, Credentials, HostConfig, RedfishFailure, RedfishRequest, RedfishResponse};
use async_trait::async_trait;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, RedfishFailure>;

/// Capability to talk to one Redfish host.
///
/// Implementations perform exactly one physical exchange per call and never
/// retry on their own. Any HTTP status is returned as a response; turning
/// non-success statuses into failures is the caller's decision.
#[async_trait]
pub trait RedfishTransport: Send + Sync {
    /// Authenticates with the host.
    ///
    /// Session authentication creates a session and returns its token. Basic
    /// authentication validates the credentials and returns them as a token.
    async fn login(&self, credentials: &Credentials) -> TransportResult<AuthToken>;

    /// Sends one request using `token`.
    async fn send(&self, token: &AuthToken, request: &RedfishRequest) -> TransportResult<RedfishResponse>;

    /// Terminates the session identified by `token`.
    async fn logout(&self, token: &AuthToken) -> TransportResult<()>;
}

/// Builds a transport for a host configuration.
pub trait TransportFactory: Send + Sync {
    /// Transport produced by this factory.
    type Transport: RedfishTransport + 'static;

    /// Creates a transport for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishFailure::InvalidInput`] when the configuration cannot
    /// be turned into a client, for example when the CA bundle is unreadable.
    fn build(&self, host: &HostConfig) -> TransportResult<Self::Transport>;
}
