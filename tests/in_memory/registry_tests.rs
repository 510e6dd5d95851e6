//! Static reloads, discovery upserts and shutdown of the host registry.

use super::helpers::{HOST_A, HOST_B, HOST_C, Harness, backoff, host};
use redfish_mcp::redfish::{
    domain::{DiscoveryRecord, HostAddress, RedfishRequest},
    services::{AccessError, HostOrigin, HostRegistryError, Invocation, StaticLoadReport, UpsertOutcome},
};
use rstest::rstest;
use std::time::Duration;

const ROOT: &str = "/redfish/v1";

fn discovered(address: &str, port: u16) -> eyre::Result<DiscoveryRecord> {
    Ok(DiscoveryRecord::new(
        HostAddress::new(address)?,
        port,
        format!("https://{address}:{port}/redfish/v1/"),
    ))
}

fn addresses(harness: &Harness) -> Vec<String> {
    harness
        .registry
        .list()
        .iter()
        .map(|config| config.address().to_string())
        .collect()
}

#[tokio::test]
async fn static_reload_reports_what_changed() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A, HOST_B], backoff(0)?).await?;
    let original_a = harness.registry.get(HOST_A)?;

    let report = harness
        .registry
        .load_static(vec![host(HOST_A)?, host(HOST_B)?.with_port(8443)?, host(HOST_C)?])
        .await?;

    assert_eq!(
        report,
        StaticLoadReport {
            added: 1,
            replaced: 1,
            unchanged: 1,
            removed: 0,
        }
    );
    assert!(std::sync::Arc::ptr_eq(&original_a, &harness.registry.get(HOST_A)?));
    assert_eq!(harness.registry.get(HOST_B)?.config().port(), 8443);
    assert_eq!(addresses(&harness), vec![HOST_A, HOST_B, HOST_C]);
    Ok(())
}

#[tokio::test]
async fn removed_hosts_are_logged_out() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A, HOST_B], backoff(0)?).await?;
    harness.access.get(HOST_A, ROOT, &Invocation::new()).await?;

    let report = harness.registry.load_static(vec![host(HOST_B)?]).await?;

    assert_eq!(report.removed, 1);
    assert_eq!(harness.factory.logout_calls(HOST_A), 1);
    assert_eq!(harness.factory.logout_calls(HOST_B), 0);
    assert!(matches!(
        harness.registry.get(HOST_A),
        Err(HostRegistryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hosts_removed_mid_login_are_logged_out_once_it_completes() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;
    harness.factory.set_latency(HOST_A, Duration::from_millis(200));
    let session = harness.registry.get(HOST_A)?;
    let access = harness.access.clone();
    let call = tokio::spawn(async move { access.get(HOST_A, ROOT, &Invocation::new()).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = harness.registry.load_static(Vec::new()).await?;
    let outcome = call.await?;

    assert_eq!(report.removed, 1);
    assert!(matches!(outcome, Err(AccessError::Cancelled { .. })), "{outcome:?}");
    assert_eq!(harness.factory.login_calls(HOST_A), 1);
    assert_eq!(harness.factory.logout_calls(HOST_A), 1);
    assert_eq!(harness.factory.send_calls(HOST_A), 0);
    assert!(session.is_retired());
    assert!(!session.state().is_authenticated());
    Ok(())
}

#[tokio::test]
async fn retired_sessions_do_not_log_in_again() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;
    let session = harness.registry.get(HOST_A)?;
    harness.access.get(HOST_A, ROOT, &Invocation::new()).await?;
    harness.registry.load_static(Vec::new()).await?;

    let outcome = session.request(&Invocation::new(), &RedfishRequest::get(ROOT)?).await;

    assert!(outcome.is_err());
    assert_eq!(harness.factory.login_calls(HOST_A), 1);
    assert_eq!(harness.factory.logout_calls(HOST_A), 1);
    Ok(())
}

#[tokio::test]
async fn discovery_never_overwrites_a_static_host() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;

    let outcome = harness.registry.upsert_discovered(&discovered(HOST_A, 8443)?)?;

    assert_eq!(outcome, UpsertOutcome::AlreadyRegistered);
    assert_eq!(harness.registry.get(HOST_A)?.config().port(), 443);
    assert_eq!(harness.registry.origin(&HostAddress::new(HOST_A)?), Some(HostOrigin::Static));
    assert_eq!(harness.factory.builds(), 1);
    Ok(())
}

#[tokio::test]
async fn static_hosts_displace_discovered_ones() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[], backoff(0)?).await?;
    assert_eq!(
        harness.registry.upsert_discovered(&discovered(HOST_B, 8443)?)?,
        UpsertOutcome::Registered
    );

    let report = harness.registry.load_static(vec![host(HOST_B)?]).await?;

    assert_eq!(report.replaced, 1);
    assert_eq!(harness.registry.origin(&HostAddress::new(HOST_B)?), Some(HostOrigin::Static));
    assert_eq!(harness.registry.get(HOST_B)?.config().port(), 443);
    Ok(())
}

#[tokio::test]
async fn discovered_hosts_survive_static_reloads() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;
    harness.registry.upsert_discovered(&discovered(HOST_C, 443)?)?;

    let report = harness.registry.load_static(Vec::new()).await?;

    assert_eq!(report.removed, 1);
    assert_eq!(addresses(&harness), vec![HOST_C]);
    Ok(())
}

#[tokio::test]
async fn duplicate_static_addresses_are_rejected_without_changes() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;

    let err = harness
        .registry
        .load_static(vec![host(HOST_B)?, host("10.0.0.6")?.with_port(8443)?])
        .await
        .expect_err("address listed twice");

    assert!(matches!(err, HostRegistryError::DuplicateAddress(_)));
    assert_eq!(addresses(&harness), vec![HOST_A]);
    Ok(())
}

#[tokio::test]
async fn unbuildable_transport_leaves_registry_untouched() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;
    harness.factory.fail_build(HOST_B);

    let err = harness
        .registry
        .load_static(vec![host(HOST_A)?, host(HOST_B)?])
        .await
        .expect_err("transport cannot be built");

    assert!(matches!(err, HostRegistryError::Transport { .. }));
    assert_eq!(addresses(&harness), vec![HOST_A]);
    Ok(())
}

#[rstest]
#[case("10.0.0.99")]
#[case("")]
#[case("bad host")]
#[tokio::test]
async fn unknown_or_malformed_addresses_are_not_found(#[case] address: &str) -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(0)?).await?;

    assert!(matches!(
        harness.registry.get(address),
        Err(HostRegistryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn lookups_ignore_case_and_brackets() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&["BMC.Example", "fe80::1"], backoff(0)?).await?;

    assert!(harness.registry.get("bmc.example").is_ok());
    assert!(harness.registry.get("[FE80::1]").is_ok());
    Ok(())
}

#[tokio::test]
async fn shutdown_logs_out_authenticated_sessions_only() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A, HOST_B], backoff(0)?).await?;
    harness.access.get(HOST_B, ROOT, &Invocation::new()).await?;

    harness.registry.shutdown().await;

    assert_eq!(harness.factory.logout_calls(HOST_A), 0);
    assert_eq!(harness.factory.logout_calls(HOST_B), 1);
    assert!(!harness.registry.get(HOST_B)?.state().is_authenticated());
    Ok(())
}
