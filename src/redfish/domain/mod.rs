//! Domain model for multi-host Redfish access.
//!
//! The domain covers host identity and configuration, authentication state,
//! the retry policy and failure taxonomy, request and response values,
//! observability events and SSDP discovery records. Network I/O and timing
//! remain outside this boundary.

mod auth;
mod backoff;
pub mod discovery;
mod error;
mod event;
mod failure;
mod host;
mod request;

pub use auth::{AuthMethod, AuthState, AuthToken, Credentials, Secret};
pub use backoff::{
    BackoffConfig, RetryClassification, RetryContext, base_delay, delay_for, should_retry,
};
pub use discovery::DiscoveryRecord;
pub use error::RedfishDomainError;
pub use event::{AccessEvent, EventOutcome, InvocationId};
pub use failure::RedfishFailure;
pub use host::{
    DEFAULT_REDFISH_PORT, EndpointSummary, HostAddress, HostConfig, HostDefaults, HostRecord,
};
pub use request::{HttpMethod, PRESERVED_HEADERS, RedfishRequest, RedfishResponse};
