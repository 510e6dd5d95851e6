//! Retry executor: runs an operation under a backoff policy.

use crate::redfish::{
    domain::{
        AccessEvent, BackoffConfig, EventOutcome, HostAddress, InvocationId, RedfishFailure,
        RetryContext, delay_for, should_retry,
    },
    ports::AccessEventSink,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identity and cancellation scope of one logical call.
///
/// Cancelling the token aborts pending backoff waits of this call only.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    id: InvocationId,
    cancel: CancellationToken,
}

impl Invocation {
    /// Creates an invocation with a fresh identifier and its own token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an invocation that is cancelled together with `cancel`.
    #[must_use]
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            id: InvocationId::new(),
            cancel,
        }
    }

    /// Returns the invocation identifier.
    #[must_use]
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns whether the caller has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Terminal failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{failure} (attempts: {}, waited: {:?})", .context.attempts_made(), .context.elapsed_wait())]
pub struct RetryError {
    failure: RedfishFailure,
    context: RetryContext,
}

impl RetryError {
    /// Creates a retry error.
    #[must_use]
    pub const fn new(failure: RedfishFailure, context: RetryContext) -> Self {
        Self { failure, context }
    }

    /// Returns the last failure.
    #[must_use]
    pub const fn failure(&self) -> &RedfishFailure {
        &self.failure
    }

    /// Returns the bookkeeping of the call.
    #[must_use]
    pub const fn context(&self) -> &RetryContext {
        &self.context
    }

    /// Returns the number of physical attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.context.attempts_made()
    }

    /// Returns the total time spent waiting between attempts.
    #[must_use]
    pub const fn elapsed_wait(&self) -> Duration {
        self.context.elapsed_wait()
    }
}

/// Runs remote operations against one host under a backoff policy.
pub struct RetryExecutor {
    host: HostAddress,
    config: BackoffConfig,
    events: Arc<dyn AccessEventSink>,
    jitter: Mutex<StdRng>,
}

impl RetryExecutor {
    /// Creates an executor whose jitter draws from operating-system entropy.
    #[must_use]
    pub fn new(host: HostAddress, config: BackoffConfig, events: Arc<dyn AccessEventSink>) -> Self {
        Self {
            host,
            config,
            events,
            jitter: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replaces the jitter source with a seeded generator.
    #[must_use]
    pub fn with_jitter_seed(self, seed: u64) -> Self {
        Self {
            jitter: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Returns the executor's policy.
    #[must_use]
    pub const fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Runs `operation` under the executor's policy.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError`] carrying the last failure when the failure is
    /// permanent, the retry budget is spent, or the invocation is cancelled.
    pub async fn execute<T, F, Fut>(
        &self,
        invocation: &Invocation,
        operation_name: &str,
        operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RedfishFailure>>,
    {
        self.execute_with(&self.config, invocation, operation_name, operation)
            .await
    }

    /// Runs `operation` under an explicit policy.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError`] carrying the last failure when the failure is
    /// permanent, the retry budget is spent, or the invocation is cancelled.
    pub async fn execute_with<T, F, Fut>(
        &self,
        config: &BackoffConfig,
        invocation: &Invocation,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RedfishFailure>>,
    {
        let mut context = RetryContext::new();
        loop {
            if invocation.is_cancelled() {
                return Err(self.cancelled(invocation, operation_name, context));
            }

            let attempt = context.attempt();
            context.record_attempt();
            let failure = match operation().await {
                Ok(value) => {
                    self.emit(invocation, operation_name, attempt, EventOutcome::Succeeded);
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let classification = failure.classification();
            context.record_failure(classification);
            if !should_retry(attempt, config, classification) {
                let outcome = if classification.is_retryable() {
                    EventOutcome::Exhausted
                } else {
                    EventOutcome::Rejected
                };
                self.events.record(
                    AccessEvent::new(invocation.id(), self.host.clone(), operation_name, attempt, outcome)
                        .with_detail(failure.to_string()),
                );
                debug!(
                    host = %self.host,
                    operation = operation_name,
                    attempts = context.attempts_made(),
                    outcome = %outcome,
                    error = %failure,
                    "giving up on operation"
                );
                return Err(RetryError::new(failure, context));
            }

            let delay = self.next_delay(attempt, config);
            self.events.record(
                AccessEvent::new(
                    invocation.id(),
                    self.host.clone(),
                    operation_name,
                    attempt,
                    EventOutcome::RetryScheduled,
                )
                .with_delay(delay)
                .with_detail(failure.to_string()),
            );
            warn!(
                host = %self.host,
                operation = operation_name,
                attempt,
                delay_ms = delay.as_millis(),
                error = %failure,
                "attempt failed, retrying"
            );

            tokio::select! {
                biased;
                () = invocation.cancellation().cancelled() => {
                    return Err(self.cancelled(invocation, operation_name, context));
                }
                () = tokio::time::sleep(delay) => {}
            }
            context.record_wait(delay);
        }
    }

    fn next_delay(&self, attempt: u32, config: &BackoffConfig) -> Duration {
        let mut rng = self.jitter.lock().unwrap_or_else(PoisonError::into_inner);
        delay_for(attempt, config, &mut *rng)
    }

    fn cancelled(&self, invocation: &Invocation, operation_name: &str, context: RetryContext) -> RetryError {
        self.emit(invocation, operation_name, context.attempt(), EventOutcome::Cancelled);
        RetryError::new(RedfishFailure::Cancelled, context)
    }

    fn emit(&self, invocation: &Invocation, operation_name: &str, attempt: u32, outcome: EventOutcome) {
        self.events.record(AccessEvent::new(
            invocation.id(),
            self.host.clone(),
            operation_name,
            attempt,
            outcome,
        ));
    }
}
