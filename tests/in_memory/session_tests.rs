//! Authentication sharing and renewal across concurrent callers.

use super::helpers::{HOST_A, Harness, backoff};
use redfish_mcp::redfish::{
    domain::{AuthState, EventOutcome, RedfishFailure},
    services::{AccessError, Invocation},
};
use std::time::Duration;
use tokio::task::JoinSet;

const SYSTEMS: &str = "/redfish/v1/Systems";

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_login() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness.factory.set_latency(HOST_A, Duration::from_millis(200));

    let mut calls = JoinSet::new();
    for _ in 0..5 {
        let access = harness.access.clone();
        calls.spawn(async move { access.get(HOST_A, SYSTEMS, &Invocation::new()).await });
    }
    while let Some(joined) = calls.join_next().await {
        joined??;
    }

    assert_eq!(harness.factory.login_calls(HOST_A), 1);
    assert_eq!(harness.factory.send_calls(HOST_A), 5);
    assert_eq!(harness.registry.get(HOST_A)?.generation(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_token_triggers_a_single_reauthentication() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await?;
    harness.factory.script_status(HOST_A, 401, 1);

    harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await?;

    assert_eq!(harness.factory.login_calls(HOST_A), 2);
    assert_eq!(harness.factory.send_calls(HOST_A), 3);
    assert_eq!(harness.registry.get(HOST_A)?.generation(), 2);
    assert!(harness.events.outcomes().contains(&EventOutcome::Invalidated));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrent_rejections_share_one_reauthentication() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await?;
    harness.factory.set_latency(HOST_A, Duration::from_millis(200));
    harness.factory.script_status(HOST_A, 401, 5);

    let mut calls = JoinSet::new();
    for _ in 0..5 {
        let access = harness.access.clone();
        calls.spawn(async move { access.get(HOST_A, SYSTEMS, &Invocation::new()).await });
    }
    while let Some(joined) = calls.join_next().await {
        joined??;
    }

    let invalidations = harness
        .events
        .outcomes()
        .into_iter()
        .filter(|outcome| *outcome == EventOutcome::Invalidated)
        .count();
    assert_eq!(harness.factory.login_calls(HOST_A), 2);
    assert_eq!(harness.factory.send_calls(HOST_A), 11);
    assert_eq!(harness.registry.get(HOST_A)?.generation(), 2);
    assert_eq!(invalidations, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_rejection_after_renewal_is_an_authentication_failure() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness.factory.script_status(HOST_A, 401, 2);

    let err = harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await
        .expect_err("renewed token is rejected too");

    assert!(matches!(err, AccessError::AuthenticationFailed { .. }), "unexpected error: {err:?}");
    assert_eq!(harness.factory.login_calls(HOST_A), 2);
    assert_eq!(harness.factory.send_calls(HOST_A), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_login_is_recorded_and_retried_by_the_next_call() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness
        .factory
        .script_login(HOST_A, Err(RedfishFailure::status(401, "Unauthorized")));

    let err = harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await
        .expect_err("credentials are rejected");
    assert!(matches!(err, AccessError::AuthenticationFailed { .. }), "unexpected error: {err:?}");
    assert_eq!(err.attempts(), 1);
    assert!(matches!(
        harness.registry.get(HOST_A)?.state(),
        AuthState::Failed { .. }
    ));
    assert_eq!(harness.factory.send_calls(HOST_A), 0);

    harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await?;
    assert!(harness.registry.get(HOST_A)?.state().is_authenticated());
    assert_eq!(harness.factory.login_calls(HOST_A), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn forbidden_login_is_an_authentication_failure() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness
        .factory
        .script_login(HOST_A, Err(RedfishFailure::status(403, "Forbidden")));

    let err = harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await
        .expect_err("login is forbidden");

    assert!(matches!(err, AccessError::AuthenticationFailed { .. }), "unexpected error: {err:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transient_login_failures_are_retried() -> eyre::Result<()> {
    let harness = Harness::with_hosts(&[HOST_A], backoff(3)?).await?;
    harness
        .factory
        .script_login(HOST_A, Err(RedfishFailure::Connection("refused".to_owned())));

    harness
        .access
        .get(HOST_A, SYSTEMS, &Invocation::new())
        .await?;

    assert_eq!(harness.factory.login_calls(HOST_A), 2);
    let login_outcomes: Vec<EventOutcome> = harness
        .events
        .for_operation("login")
        .iter()
        .map(|event| event.outcome)
        .collect();
    assert_eq!(
        login_outcomes,
        vec![
            EventOutcome::RetryScheduled,
            EventOutcome::Succeeded,
            EventOutcome::Authenticated,
        ]
    );
    Ok(())
}
