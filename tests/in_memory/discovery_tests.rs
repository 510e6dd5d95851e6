//! Background discovery loop feeding the registry.

use super::helpers::{HOST_A, HOST_B, HOST_C, Harness, backoff};
use redfish_mcp::redfish::{
    adapters::memory::StaticDiscoveryProbe,
    domain::{DiscoveryRecord, HostAddress},
    ports::DiscoveryError,
    services::{DiscoveryLoop, HostOrigin, MIN_DISCOVERY_INTERVAL},
};
use std::io;
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(10);

fn record(address: &str, port: u16) -> eyre::Result<DiscoveryRecord> {
    Ok(DiscoveryRecord::new(
        HostAddress::new(address)?,
        port,
        format!("https://{address}:{port}/redfish/v1/"),
    ))
}

#[tokio::test(start_paused = true)]
async fn probes_register_new_hosts_until_shutdown() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;
    let probe = StaticDiscoveryProbe::new();
    probe.push_cycle(Ok(vec![record(HOST_B, 8443)?]));
    probe.push_cycle(Err(DiscoveryError::socket(io::Error::other("network down"))));
    probe.push_cycle(Ok(vec![record(HOST_A, 443)?, record(HOST_B, 8443)?, record(HOST_C, 443)?]));

    let handle = DiscoveryLoop::spawn(probe.clone(), Arc::clone(&harness.registry), INTERVAL);
    tokio::time::sleep(Duration::from_secs(25)).await;
    let stats = handle.shutdown().await;

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.probe_failures, 1);
    assert_eq!(stats.records_seen, 4);
    assert_eq!(stats.registered, 2);
    assert_eq!(stats.rejected, 0);
    assert_eq!(probe.probes(), 3);

    let origins: Vec<Option<HostOrigin>> = [HOST_A, HOST_B, HOST_C]
        .iter()
        .map(|address| HostAddress::new(*address).map(|key| harness.registry.origin(&key)))
        .collect::<Result<_, _>>()?;
    assert_eq!(
        origins,
        vec![
            Some(HostOrigin::Static),
            Some(HostOrigin::Discovered),
            Some(HostOrigin::Discovered),
        ]
    );
    assert_eq!(harness.registry.get(HOST_B)?.config().port(), 8443);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn first_probe_runs_immediately() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[], backoff(0)?).await?;
    let probe = StaticDiscoveryProbe::new();
    probe.push_cycle(Ok(vec![record(HOST_B, 443)?]));

    let handle = DiscoveryLoop::spawn(probe.clone(), Arc::clone(&harness.registry), INTERVAL);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(harness.registry.get(HOST_B).is_ok());
    let stats = handle.shutdown().await;
    assert_eq!(stats.cycles, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_interval_probes_at_the_minimum_cadence() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[], backoff(0)?).await?;
    let probe = StaticDiscoveryProbe::new();

    let handle = DiscoveryLoop::spawn(probe.clone(), Arc::clone(&harness.registry), Duration::ZERO);
    tokio::time::sleep(MIN_DISCOVERY_INTERVAL * 2 + Duration::from_millis(500)).await;
    let stats = handle.shutdown().await;

    assert_eq!(stats.cycles, 3);
    assert_eq!(probe.probes(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hosts_without_transport_are_counted_as_rejected() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[], backoff(0)?).await?;
    harness.factory.fail_build(HOST_C);
    let probe = StaticDiscoveryProbe::new();
    probe.push_cycle(Ok(vec![record(HOST_B, 443)?, record(HOST_C, 443)?]));

    let handle = DiscoveryLoop::spawn(probe, Arc::clone(&harness.registry), INTERVAL);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stats = handle.shutdown().await;

    assert_eq!(stats.registered, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(harness.registry.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_probing() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[], backoff(0)?).await?;
    let probe = StaticDiscoveryProbe::new();

    let handle = DiscoveryLoop::spawn(probe.clone(), Arc::clone(&harness.registry), INTERVAL);
    tokio::time::sleep(Duration::from_secs(15)).await;
    handle.shutdown().await;
    let probes_at_shutdown = probe.probes();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(probes_at_shutdown, 2);
    assert_eq!(probe.probes(), probes_at_shutdown);
    assert!(harness.registry.is_empty());
    Ok(())
}
