//! Facade behaviour: lookups, error mapping and cross-host concurrency.

use super::helpers::{HOST_A, HOST_B, Harness, backoff, host};
use redfish_mcp::redfish::{
    domain::{HttpMethod, RedfishFailure, RedfishRequest, RedfishResponse},
    services::{AccessError, Invocation},
};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

const SYSTEMS: &str = "/redfish/v1/Systems";

#[tokio::test]
async fn unknown_hosts_fail_without_network_calls() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;

    let err = harness
        .access
        .get("10.9.9.9", SYSTEMS, &Invocation::new())
        .await
        .expect_err("host is not registered");

    assert_eq!(
        err,
        AccessError::NotFound {
            address: "10.9.9.9".to_owned()
        }
    );
    assert_eq!(err.attempts(), 0);
    assert_eq!(harness.factory.total_calls(), 0);
    Ok(())
}

#[rstest]
#[case("redfish/v1")]
#[case("//evil.example/redfish/v1")]
#[case("/\\evil.example/redfish/v1")]
#[tokio::test]
async fn paths_off_the_host_are_rejected_before_login(#[case] path: &str) -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;

    let err = harness
        .access
        .get(HOST_A, path, &Invocation::new())
        .await
        .expect_err("path does not stay on the host");

    assert!(matches!(
        err,
        AccessError::InvalidRequest {
            status: None,
            attempts: 0,
            ..
        }
    ));
    assert_eq!(harness.factory.total_calls(), 0);
    Ok(())
}

#[rstest]
#[case(400)]
#[case(404)]
#[case(405)]
#[tokio::test]
async fn client_errors_are_not_retried(#[case] status: u16) -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness.factory.script_status(HOST_A, status, 1);

    let err = harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await
        .expect_err("client error is terminal");

    assert!(
        matches!(err, AccessError::InvalidRequest { status: Some(code), attempts: 1, .. } if code == status),
        "unexpected error: {err:?}"
    );
    assert_eq!(harness.factory.send_calls(HOST_A), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried_and_reported_as_unreachable() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(1)?).await?;
    for _ in 0..2 {
        harness
            .factory
            .script_response(HOST_A, Err(RedfishFailure::Timeout("deadline elapsed".to_owned())));
    }

    let err = harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await
        .expect_err("host keeps timing out");

    assert!(matches!(err, AccessError::Unreachable { attempts: 2, .. }), "unexpected error: {err:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hosts_are_served_concurrently() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A, HOST_B], backoff(3)?).await?;
    harness.factory.set_latency(HOST_A, Duration::from_secs(2));
    harness.factory.set_latency(HOST_B, Duration::from_secs(3));

    let (on_a, on_b) = (Invocation::new(), Invocation::new());
    let started = Instant::now();
    let (first, second) = tokio::join!(
        harness.access.get(HOST_A, SYSTEMS, &on_a),
        harness.access.get(HOST_B, SYSTEMS, &on_b),
    );
    first?;
    second?;

    // One login and one request per host.
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7),
        "hosts were not served concurrently: {elapsed:?}"
    );
    Ok(())
}

#[tokio::test]
async fn responses_keep_headers_and_body() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness.factory.script_response(
        HOST_A,
        Ok(RedfishResponse::ok(json!({"Id": "1"})).with_header("ETag", "W/\"7\"")),
    );

    let response = harness
        .access
        .get(HOST_A, "/redfish/v1/Systems/1", &Invocation::new())
        .await?;

    assert_eq!(
        response.into_payload(),
        json!({"headers": {"ETag": "W/\"7\""}, "data": {"Id": "1"}})
    );
    assert_eq!(harness.factory.sent_paths(HOST_A), vec!["/redfish/v1/Systems/1"]);
    Ok(())
}

#[tokio::test]
async fn fetch_sends_arbitrary_methods() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    let request = RedfishRequest::new(
        HttpMethod::Patch,
        "/redfish/v1/Systems/1",
        Some(json!({"AssetTag": "rack-7"})),
    )?;

    harness
        .access
        .fetch(HOST_A, &request, &Invocation::new())
        .await?;

    assert_eq!(harness.factory.send_calls(HOST_A), 1);
    Ok(())
}

#[tokio::test]
async fn listings_hide_credentials() -> eyre::Result<()> {
    let harness = Harness::new(backoff(3)?);
    harness
        .registry
        .load_static(vec![host(HOST_A)?, host(HOST_B)?.with_port(8443)?])
        .await?;

    let hosts = harness.access.list_hosts();
    assert!(hosts.iter().all(|config| config.username().is_empty()));

    let endpoints = serde_json::to_value(harness.access.list_endpoints())?;
    assert_eq!(
        endpoints,
        json!([
            {"address": HOST_A, "port": 443},
            {"address": HOST_B, "port": 8443},
        ])
    );
    Ok(())
}
