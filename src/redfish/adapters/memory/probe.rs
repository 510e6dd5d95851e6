//! Discovery probe that replays canned cycles.

use crate::redfish::{
    domain::DiscoveryRecord,
    ports::{DiscoveryProbe, DiscoveryResult},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Probe returning queued results, one per cycle.
///
/// Once the queue is empty every probe finds nothing. Clones share the queue
/// and the cycle counter.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscoveryProbe {
    state: Arc<Mutex<ProbeState>>,
}

#[derive(Debug, Default)]
struct ProbeState {
    cycles: VecDeque<DiscoveryResult<Vec<DiscoveryRecord>>>,
    probes: usize,
}

impl StaticDiscoveryProbe {
    /// Creates a probe with no queued cycles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of a future probe cycle.
    pub fn push_cycle(&self, result: DiscoveryResult<Vec<DiscoveryRecord>>) {
        self.lock().cycles.push_back(result);
    }

    /// Returns the number of probes performed.
    #[must_use]
    pub fn probes(&self) -> usize {
        self.lock().probes
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DiscoveryProbe for StaticDiscoveryProbe {
    async fn probe(&self) -> DiscoveryResult<Vec<DiscoveryRecord>> {
        let mut state = self.lock();
        state.probes = state.probes.saturating_add(1);
        state.cycles.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
