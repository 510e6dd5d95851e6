//! Thread-safe map from host address to host session.

use super::session::{HostSession, SessionSettings};
use crate::redfish::{
    domain::{DiscoveryRecord, HostAddress, HostConfig, HostDefaults, RedfishFailure},
    ports::TransportFactory,
};
use std::collections::{HashMap, HashSet, hash_map::Entry};
use std::mem;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Where a registered host came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOrigin {
    /// Loaded from the static host list.
    Static,
    /// Found by network discovery.
    Discovered,
}

/// Counts produced by a static reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticLoadReport {
    /// Hosts that were not registered before.
    pub added: usize,
    /// Hosts whose configuration changed or that displaced a discovered host.
    pub replaced: usize,
    /// Hosts that kept their live session.
    pub unchanged: usize,
    /// Static hosts absent from the new list.
    pub removed: usize,
}

/// Result of offering a discovered host to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new session was registered.
    Registered,
    /// A session already exists for the address and was left alone.
    AlreadyRegistered,
}

/// Errors returned by the host registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostRegistryError {
    /// No session is registered under the address.
    #[error("no host registered for address {0}")]
    NotFound(String),
    /// The same address appears more than once in one static list.
    #[error("host address {0} is listed more than once")]
    DuplicateAddress(HostAddress),
    /// A transport could not be built for the host.
    #[error("cannot create transport for {address}: {source}")]
    Transport {
        /// Host whose transport failed.
        address: HostAddress,
        /// Underlying failure.
        source: RedfishFailure,
    },
}

/// Result type for registry operations.
pub type HostRegistryResult<T> = Result<T, HostRegistryError>;

struct RegistryEntry<T> {
    session: Arc<HostSession<T>>,
    origin: HostOrigin,
    sequence: u64,
}

struct RegistryState<T> {
    entries: HashMap<HostAddress, RegistryEntry<T>>,
    next_sequence: u64,
}

impl<T> RegistryState<T> {
    const fn allocate_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        sequence
    }
}

impl<T> Default for RegistryState<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_sequence: 0,
        }
    }
}

/// Registry of host sessions keyed by address.
///
/// Static hosts always take precedence over discovered ones. Mutations are
/// serialized; reads observe a consistent snapshot.
pub struct HostRegistry<F>
where
    F: TransportFactory,
{
    factory: F,
    settings: SessionSettings,
    defaults: HostDefaults,
    state: RwLock<RegistryState<F::Transport>>,
    reload_gate: Mutex<()>,
}

impl<F> HostRegistry<F>
where
    F: TransportFactory,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(factory: F, settings: SessionSettings, defaults: HostDefaults) -> Self {
        Self {
            factory,
            settings,
            defaults,
            state: RwLock::new(RegistryState::default()),
            reload_gate: Mutex::new(()),
        }
    }

    /// Returns the defaults applied to discovered hosts.
    #[must_use]
    pub const fn defaults(&self) -> &HostDefaults {
        &self.defaults
    }

    /// Atomically replaces the static subset of the registry.
    ///
    /// Unchanged hosts keep their live session. Changed and removed hosts are
    /// logged out after the swap. Discovered hosts are untouched unless a
    /// static host claims their address.
    ///
    /// # Errors
    ///
    /// Returns [`HostRegistryError::DuplicateAddress`] when an address repeats
    /// and [`HostRegistryError::Transport`] when a transport cannot be built.
    /// The registry is unchanged on error.
    pub async fn load_static(&self, configs: Vec<HostConfig>) -> HostRegistryResult<StaticLoadReport> {
        let _reload = self.reload_gate.lock().await;

        let mut seen = HashSet::with_capacity(configs.len());
        for config in &configs {
            if !seen.insert(config.address().clone()) {
                return Err(HostRegistryError::DuplicateAddress(config.address().clone()));
            }
        }

        let mut planned = Vec::with_capacity(configs.len());
        for config in configs {
            let existing = self
                .read_state()
                .entries
                .get(config.address())
                .filter(|entry| entry.session.config() == &config)
                .map(|entry| Arc::clone(&entry.session));
            let session = match existing {
                Some(session) => session,
                None => Arc::new(self.build_session(config)?),
            };
            planned.push(session);
        }

        let mut report = StaticLoadReport::default();
        let mut retired = Vec::new();
        {
            let mut guard = self.write_state();
            let state = &mut *guard;
            for session in planned {
                let address = session.config().address().clone();
                if let Some(entry) = state.entries.get_mut(&address) {
                    let kept = Arc::ptr_eq(&entry.session, &session);
                    if kept && entry.origin == HostOrigin::Static {
                        report.unchanged = report.unchanged.saturating_add(1);
                    } else {
                        report.replaced = report.replaced.saturating_add(1);
                    }
                    if !kept {
                        retired.push(mem::replace(&mut entry.session, session));
                    }
                    entry.origin = HostOrigin::Static;
                } else {
                    let sequence = state.allocate_sequence();
                    state.entries.insert(
                        address,
                        RegistryEntry {
                            session,
                            origin: HostOrigin::Static,
                            sequence,
                        },
                    );
                    report.added = report.added.saturating_add(1);
                }
            }

            let stale: Vec<HostAddress> = state
                .entries
                .iter()
                .filter(|(address, entry)| entry.origin == HostOrigin::Static && !seen.contains(*address))
                .map(|(address, _)| address.clone())
                .collect();
            for address in stale {
                if let Some(entry) = state.entries.remove(&address) {
                    retired.push(entry.session);
                    report.removed = report.removed.saturating_add(1);
                }
            }
        }

        for session in retired {
            session.logout().await;
        }
        info!(
            added = report.added,
            replaced = report.replaced,
            unchanged = report.unchanged,
            removed = report.removed,
            "static hosts loaded"
        );
        Ok(report)
    }

    /// Registers a discovered host unless its address is already known.
    ///
    /// # Errors
    ///
    /// Returns [`HostRegistryError::Transport`] when a transport cannot be
    /// built for the host.
    pub fn upsert_discovered(&self, record: &DiscoveryRecord) -> HostRegistryResult<UpsertOutcome> {
        if self.read_state().entries.contains_key(record.address()) {
            return Ok(UpsertOutcome::AlreadyRegistered);
        }

        let session = Arc::new(self.build_session(record.to_host_config(&self.defaults))?);
        let mut guard = self.write_state();
        let state = &mut *guard;
        let sequence = state.next_sequence;
        match state.entries.entry(record.address().clone()) {
            Entry::Occupied(_) => Ok(UpsertOutcome::AlreadyRegistered),
            Entry::Vacant(slot) => {
                slot.insert(RegistryEntry {
                    session,
                    origin: HostOrigin::Discovered,
                    sequence,
                });
                state.next_sequence = sequence.saturating_add(1);
                info!(
                    address = %record.address(),
                    port = record.port(),
                    service_root = record.service_root(),
                    "registered discovered host"
                );
                Ok(UpsertOutcome::Registered)
            }
        }
    }

    /// Returns the registered configurations in first-registration order.
    #[must_use]
    pub fn list(&self) -> Vec<HostConfig> {
        self.sessions()
            .iter()
            .map(|session| session.config().clone())
            .collect()
    }

    /// Returns the registered sessions in first-registration order.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<HostSession<F::Transport>>> {
        let state = self.read_state();
        let mut ordered: Vec<&RegistryEntry<F::Transport>> = state.entries.values().collect();
        ordered.sort_by_key(|entry| entry.sequence);
        ordered
            .into_iter()
            .map(|entry| Arc::clone(&entry.session))
            .collect()
    }

    /// Returns where the host registered under `address` came from.
    #[must_use]
    pub fn origin(&self, address: &HostAddress) -> Option<HostOrigin> {
        self.read_state().entries.get(address).map(|entry| entry.origin)
    }

    /// Returns the number of registered hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    /// Returns whether no host is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_state().entries.is_empty()
    }

    /// Resolves a session by address.
    ///
    /// The address is normalized the same way configured addresses are.
    ///
    /// # Errors
    ///
    /// Returns [`HostRegistryError::NotFound`] for unknown or malformed
    /// addresses.
    pub fn get(&self, address: &str) -> HostRegistryResult<Arc<HostSession<F::Transport>>> {
        let not_found = || HostRegistryError::NotFound(address.to_owned());
        let key = HostAddress::new(address).map_err(|_| not_found())?;
        self.read_state()
            .entries
            .get(&key)
            .map(|entry| Arc::clone(&entry.session))
            .ok_or_else(not_found)
    }

    /// Logs out and retires every registered session.
    pub async fn shutdown(&self) {
        let sessions = self.sessions();
        debug!(hosts = sessions.len(), "logging out all sessions");
        for session in sessions {
            session.logout().await;
        }
    }

    fn build_session(&self, config: HostConfig) -> HostRegistryResult<HostSession<F::Transport>> {
        let transport = self
            .factory
            .build(&config)
            .map_err(|source| HostRegistryError::Transport {
                address: config.address().clone(),
                source,
            })?;
        Ok(HostSession::new(config, transport, &self.settings))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState<F::Transport>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState<F::Transport>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
