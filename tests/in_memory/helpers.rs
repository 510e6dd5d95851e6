//! Shared test helpers for in-memory integration tests.

use mockable::DefaultClock;
use redfish_mcp::redfish::{
    adapters::memory::{RecordingEventSink, ScriptedTransportFactory},
    domain::{BackoffConfig, HostAddress, HostConfig, HostDefaults},
    services::{HostRegistry, RedfishAccess, SessionSettings},
};
use std::sync::Arc;
use std::time::Duration;

/// Address of the first test host.
pub const HOST_A: &str = "10.0.0.5";
/// Address of the second test host.
pub const HOST_B: &str = "10.0.0.6";
/// Address of the third test host.
pub const HOST_C: &str = "10.0.0.7";

/// Returns a jitter-free policy: 1s initial delay, doubling, capped at 60s.
///
/// # Errors
///
/// Returns an error if the policy is rejected.
pub fn backoff(max_retries: u32) -> eyre::Result<BackoffConfig> {
    Ok(BackoffConfig::new(
        max_retries,
        Duration::from_secs(1),
        Duration::from_secs(60),
        2.0,
        false,
    )?)
}

/// Returns a host configuration with test credentials.
///
/// # Errors
///
/// Returns an error if the address is invalid.
pub fn host(address: &str) -> eyre::Result<HostConfig> {
    Ok(HostConfig::new(HostAddress::new(address)?, &HostDefaults::default())
        .with_credentials("admin", "secret"))
}

/// Registry, facade and inspection handles over a scripted transport.
pub struct Harness {
    /// Scripts and counts network exchanges.
    pub factory: ScriptedTransportFactory,
    /// Records every access event.
    pub events: Arc<RecordingEventSink>,
    /// Registry under test.
    pub registry: Arc<HostRegistry<ScriptedTransportFactory>>,
    /// Facade over the registry.
    pub access: RedfishAccess<ScriptedTransportFactory>,
}

impl Harness {
    /// Creates an empty harness using `backoff` for every host.
    #[must_use]
    pub fn new(backoff: BackoffConfig) -> Self {
        let factory = ScriptedTransportFactory::new();
        let events = Arc::new(RecordingEventSink::new());
        let settings = SessionSettings::new(backoff, events.clone(), Arc::new(DefaultClock));
        let registry = Arc::new(HostRegistry::new(
            factory.clone(),
            settings,
            HostDefaults::default(),
        ));
        let access = RedfishAccess::new(Arc::clone(&registry));
        Self {
            factory,
            events,
            registry,
            access,
        }
    }

    /// Creates a harness with `addresses` loaded as static hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if a host is invalid or cannot be registered.
    pub async fn with_hosts(addresses: &[&str], backoff: BackoffConfig) -> eyre::Result<Self> {
        let harness = Self::new(backoff);
        let configs = addresses
            .iter()
            .map(|address| host(address))
            .collect::<eyre::Result<Vec<_>>>()?;
        harness.registry.load_static(configs).await?;
        Ok(harness)
    }
}
