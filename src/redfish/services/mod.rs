//! Orchestration services for multi-host Redfish access.

mod access;
mod discovery;
mod registry;
mod retry;
mod session;

pub use access::{AccessError, AccessResult, RedfishAccess};
pub use discovery::{
    DEFAULT_DISCOVERY_INTERVAL, DiscoveryHandle, DiscoveryLoop, DiscoveryStats, MIN_DISCOVERY_INTERVAL,
};
pub use registry::{
    HostOrigin, HostRegistry, HostRegistryError, HostRegistryResult, StaticLoadReport,
    UpsertOutcome,
};
pub use retry::{Invocation, RetryError, RetryExecutor};
pub use session::{HostSession, SessionError, SessionResult, SessionSettings};
