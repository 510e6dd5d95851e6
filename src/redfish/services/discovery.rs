//! Periodic discovery feeding a single registry applier.

use super::registry::{HostRegistry, UpsertOutcome};
use crate::redfish::{
    domain::DiscoveryRecord,
    ports::{DiscoveryProbe, TransportFactory},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RECORD_CHANNEL_CAPACITY: usize = 64;

/// Default time between probe cycles.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest time between probe cycles; shorter intervals are raised to it.
pub const MIN_DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);

/// Counters reported when discovery stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Probe cycles started.
    pub cycles: u64,
    /// Probe cycles that failed.
    pub probe_failures: u64,
    /// Records received from probes.
    pub records_seen: u64,
    /// Hosts newly registered.
    pub registered: u64,
    /// Records rejected by the registry.
    pub rejected: u64,
}

/// Background discovery: one probe task and one applier task.
pub struct DiscoveryLoop;

impl DiscoveryLoop {
    /// Starts probing every `interval` and registering what is found.
    ///
    /// The first probe runs immediately. An `interval` below
    /// [`MIN_DISCOVERY_INTERVAL`] is raised to it.
    #[must_use]
    pub fn spawn<P, F>(probe: P, registry: Arc<HostRegistry<F>>, interval: Duration) -> DiscoveryHandle
    where
        P: DiscoveryProbe + 'static,
        F: TransportFactory + 'static,
    {
        let cancel = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        let cadence = interval.max(MIN_DISCOVERY_INTERVAL);
        let probe_task = tokio::spawn(run_probe(probe, sender, cadence, cancel.clone()));
        let apply_task = tokio::spawn(run_applier(receiver, registry));
        DiscoveryHandle {
            cancel,
            probe_task,
            apply_task,
        }
    }
}

/// Controls a running discovery loop.
pub struct DiscoveryHandle {
    cancel: CancellationToken,
    probe_task: JoinHandle<ProbeStats>,
    apply_task: JoinHandle<ApplyStats>,
}

impl DiscoveryHandle {
    /// Stops probing, applies queued records and returns the counters.
    pub async fn shutdown(self) -> DiscoveryStats {
        self.cancel.cancel();
        let probe = self.probe_task.await.unwrap_or_else(|err| {
            warn!(error = %err, "discovery probe task ended abnormally");
            ProbeStats::default()
        });
        let apply = self.apply_task.await.unwrap_or_else(|err| {
            warn!(error = %err, "discovery applier task ended abnormally");
            ApplyStats::default()
        });
        let stats = DiscoveryStats {
            cycles: probe.cycles,
            probe_failures: probe.failures,
            records_seen: probe.records,
            registered: apply.registered,
            rejected: apply.rejected,
        };
        info!(?stats, "discovery stopped");
        stats
    }
}

#[derive(Debug, Default)]
struct ProbeStats {
    cycles: u64,
    failures: u64,
    records: u64,
}

#[derive(Debug, Default)]
struct ApplyStats {
    registered: u64,
    rejected: u64,
}

async fn run_probe<P>(
    probe: P,
    sender: mpsc::Sender<DiscoveryRecord>,
    interval: Duration,
    cancel: CancellationToken,
) -> ProbeStats
where
    P: DiscoveryProbe,
{
    let mut stats = ProbeStats::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        stats.cycles = stats.cycles.saturating_add(1);
        let records = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = probe.probe() => match outcome {
                Ok(records) => records,
                Err(err) => {
                    stats.failures = stats.failures.saturating_add(1);
                    warn!(error = %err, "discovery probe failed");
                    continue;
                }
            },
        };

        debug!(found = records.len(), "discovery probe completed");
        for record in records {
            stats.records = stats.records.saturating_add(1);
            if sender.send(record).await.is_err() {
                return stats;
            }
        }
    }
    stats
}

async fn run_applier<F>(mut receiver: mpsc::Receiver<DiscoveryRecord>, registry: Arc<HostRegistry<F>>) -> ApplyStats
where
    F: TransportFactory,
{
    let mut stats = ApplyStats::default();
    while let Some(record) = receiver.recv().await {
        match registry.upsert_discovered(&record) {
            Ok(UpsertOutcome::Registered) => stats.registered = stats.registered.saturating_add(1),
            Ok(UpsertOutcome::AlreadyRegistered) => {}
            Err(err) => {
                stats.rejected = stats.rejected.saturating_add(1);
                warn!(address = %record.address(), error = %err, "discovered host not registered");
            }
        }
    }
    stats
}
