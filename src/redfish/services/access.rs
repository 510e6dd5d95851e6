//! Facade used by tool handlers.

use super::{
    registry::HostRegistry,
    retry::Invocation,
    session::{HostSession, SessionError},
};
use crate::redfish::{
    domain::{EndpointSummary, HostConfig, RedfishRequest, RedfishResponse},
    ports::TransportFactory,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced to tool callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No host is registered under the address.
    #[error("host {address} is not registered")]
    NotFound {
        /// Requested address.
        address: String,
    },
    /// The host rejected the configured credentials.
    #[error("authentication with {host} failed after {attempts} attempt(s): {message}")]
    AuthenticationFailed {
        /// Target host.
        host: String,
        /// Physical attempts made.
        attempts: u32,
        /// Total time spent waiting between attempts.
        elapsed: Duration,
        /// Last failure.
        message: String,
    },
    /// The host stayed unavailable for the whole retry budget.
    #[error("host {host} unreachable after {attempts} attempt(s) over {elapsed:?}: {message}")]
    Unreachable {
        /// Target host.
        host: String,
        /// Physical attempts made.
        attempts: u32,
        /// Total time spent waiting between attempts.
        elapsed: Duration,
        /// Last failure.
        message: String,
    },
    /// The request is malformed or the host refused it permanently.
    #[error("invalid request to {host}: {message}")]
    InvalidRequest {
        /// Target host.
        host: String,
        /// HTTP status returned by the host, if any.
        status: Option<u16>,
        /// Physical attempts made.
        attempts: u32,
        /// Total time spent waiting between attempts.
        elapsed: Duration,
        /// Failure description.
        message: String,
    },
    /// The caller cancelled the call.
    #[error("request to {host} cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Target host.
        host: String,
        /// Physical attempts made before cancellation.
        attempts: u32,
        /// Total time spent waiting before cancellation.
        elapsed: Duration,
    },
}

impl AccessError {
    /// Returns the number of physical attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::NotFound { .. } => 0,
            Self::AuthenticationFailed { attempts, .. }
            | Self::Unreachable { attempts, .. }
            | Self::InvalidRequest { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Returns the total time spent waiting between attempts.
    #[must_use]
    pub const fn elapsed_wait(&self) -> Duration {
        match self {
            Self::AuthenticationFailed { elapsed, .. }
            | Self::Unreachable { elapsed, .. }
            | Self::InvalidRequest { elapsed, .. }
            | Self::Cancelled { elapsed, .. } => *elapsed,
            Self::NotFound { .. } => Duration::ZERO,
        }
    }
}

impl From<SessionError> for AccessError {
    fn from(err: SessionError) -> Self {
        let host = err.host().to_string();
        let retry = err.retry_error();
        let failure = retry.failure();
        let attempts = retry.attempts();
        let elapsed = retry.elapsed_wait();
        let message = failure.to_string();

        let login_forbidden = err.is_login() && failure.http_status() == Some(403);
        if failure.is_cancelled() {
            Self::Cancelled {
                host,
                attempts,
                elapsed,
            }
        } else if failure.is_auth_rejection() || login_forbidden {
            Self::AuthenticationFailed {
                host,
                attempts,
                elapsed,
                message,
            }
        } else if failure.classification().is_retryable() {
            Self::Unreachable {
                host,
                attempts,
                elapsed,
                message,
            }
        } else {
            Self::InvalidRequest {
                host,
                status: failure.http_status(),
                attempts,
                elapsed,
                message,
            }
        }
    }
}

/// Result type for facade operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Read access to every registered host.
pub struct RedfishAccess<F>
where
    F: TransportFactory,
{
    registry: Arc<HostRegistry<F>>,
}

impl<F> Clone for RedfishAccess<F>
where
    F: TransportFactory,
{
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<F> RedfishAccess<F>
where
    F: TransportFactory,
{
    /// Creates a facade over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<HostRegistry<F>>) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<HostRegistry<F>> {
        &self.registry
    }

    /// Returns every registered host with credentials removed.
    #[must_use]
    pub fn list_hosts(&self) -> Vec<HostConfig> {
        self.registry.list().iter().map(HostConfig::redacted).collect()
    }

    /// Returns the address and port of every registered host.
    #[must_use]
    pub fn list_endpoints(&self) -> Vec<EndpointSummary> {
        self.registry.list().iter().map(HostConfig::endpoint).collect()
    }

    /// Sends `request` to the host registered under `address`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotFound`] without touching the network when
    /// the address is unknown; other variants describe the terminal failure.
    pub async fn fetch(
        &self,
        address: &str,
        request: &RedfishRequest,
        invocation: &Invocation,
    ) -> AccessResult<RedfishResponse> {
        let session = self.session(address)?;
        Self::send(&session, request, invocation).await
    }

    /// Reads the resource at `path` from the host registered under
    /// `address`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotFound`] for unknown hosts and
    /// [`AccessError::InvalidRequest`] for paths not starting with `/`, in
    /// both cases without touching the network.
    pub async fn get(&self, address: &str, path: &str, invocation: &Invocation) -> AccessResult<RedfishResponse> {
        let session = self.session(address)?;
        let request = RedfishRequest::get(path).map_err(|err| AccessError::InvalidRequest {
            host: session.config().address().to_string(),
            status: None,
            attempts: 0,
            elapsed: Duration::ZERO,
            message: err.to_string(),
        })?;
        Self::send(&session, &request, invocation).await
    }

    fn session(&self, address: &str) -> AccessResult<Arc<HostSession<F::Transport>>> {
        self.registry.get(address).map_err(|_| AccessError::NotFound {
            address: address.to_owned(),
        })
    }

    async fn send(
        session: &HostSession<F::Transport>,
        request: &RedfishRequest,
        invocation: &Invocation,
    ) -> AccessResult<RedfishResponse> {
        debug!(
            host = %session.config().address(),
            method = request.method().as_str(),
            path = request.path(),
            invocation = %invocation.id(),
            "fetching resource"
        );
        session
            .request(invocation, request)
            .await
            .map_err(AccessError::from)
    }
}
