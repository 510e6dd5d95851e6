//! Retry budget, backoff timing and failure classification.
//!
//! The functions here are pure: given the same configuration, attempt number
//! and random source they always produce the same answer. Suspending between
//! attempts is the job of the retry executor.

use super::RedfishDomainError;
use rand::Rng;
use std::time::Duration;

const JITTER_LOWER_BOUND: f64 = 0.5;
const JITTER_UPPER_BOUND: f64 = 1.5;

/// Whether a failure may succeed if the operation is attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryClassification {
    /// Transient failure; another attempt may succeed.
    Retryable,
    /// Permanent failure; repeating the operation cannot help.
    NonRetryable,
}

impl RetryClassification {
    /// Returns whether the classification permits another attempt.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Immutable retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: bool,
}

impl BackoffConfig {
    /// Creates a validated retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishDomainError`] when `initial_delay` is zero,
    /// `max_delay < initial_delay`, or `backoff_factor` is below `1.0` or
    /// not finite.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        jitter: bool,
    ) -> Result<Self, RedfishDomainError> {
        if initial_delay.is_zero() {
            return Err(RedfishDomainError::ZeroInitialDelay);
        }
        if max_delay < initial_delay {
            return Err(RedfishDomainError::MaxDelayBelowInitial {
                initial_delay,
                max_delay,
            });
        }
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(RedfishDomainError::InvalidBackoffFactor(
                backoff_factor.to_string(),
            ));
        }

        Ok(Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_factor,
            jitter,
        })
    }

    /// Returns a copy of this policy that allows a single attempt only.
    #[must_use]
    pub const fn without_retries(self) -> Self {
        Self {
            max_retries: 0,
            ..self
        }
    }

    /// Returns the number of retries allowed after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the delay ceiling.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the exponential growth factor.
    #[must_use]
    pub const fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Returns whether delays are randomized.
    #[must_use]
    pub const fn jitter(&self) -> bool {
        self.jitter
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

/// Returns the un-jittered delay before retry `attempt` (0-based).
///
/// The value is `min(max_delay, initial_delay * backoff_factor^attempt)`.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "exponential backoff is defined over a real-valued growth factor"
)]
pub fn base_delay(attempt: u32, config: &BackoffConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let scaled = config.initial_delay.as_secs_f64() * config.backoff_factor.powi(exponent);
    let capped = scaled.min(config.max_delay.as_secs_f64());
    Duration::try_from_secs_f64(capped)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Returns the delay before retry `attempt` (0-based), applying jitter when
/// the policy enables it.
///
/// Jitter multiplies the base delay by a uniform factor in `[0.5, 1.5]`, so
/// the result never exceeds `1.5 * max_delay`.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "jitter scales the delay by a real-valued random factor"
)]
pub fn delay_for<R: Rng + ?Sized>(attempt: u32, config: &BackoffConfig, rng: &mut R) -> Duration {
    let base = base_delay(attempt, config);
    if !config.jitter {
        return base;
    }

    let factor = rng.random_range(JITTER_LOWER_BOUND..=JITTER_UPPER_BOUND);
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
}

/// Returns whether a failure seen after `attempt` retries warrants another
/// attempt.
#[must_use]
pub const fn should_retry(
    attempt: u32,
    config: &BackoffConfig,
    classification: RetryClassification,
) -> bool {
    classification.is_retryable() && attempt < config.max_retries
}

/// Bookkeeping for one logical call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryContext {
    attempt: u32,
    attempts_made: u32,
    elapsed_wait: Duration,
    classification: Option<RetryClassification>,
}

impl RetryContext {
    /// Creates a context before the first attempt.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempt: 0,
            attempts_made: 0,
            elapsed_wait: Duration::ZERO,
            classification: None,
        }
    }

    /// Returns the number of retries already performed.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the number of physical attempts started.
    #[must_use]
    pub const fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Returns the total time spent waiting between attempts.
    #[must_use]
    pub const fn elapsed_wait(&self) -> Duration {
        self.elapsed_wait
    }

    /// Returns the classification of the most recent failure.
    #[must_use]
    pub const fn classification(&self) -> Option<RetryClassification> {
        self.classification
    }

    /// Records that a physical attempt is starting.
    pub const fn record_attempt(&mut self) {
        self.attempts_made = self.attempts_made.saturating_add(1);
    }

    /// Records the classification of a failed attempt.
    pub const fn record_failure(&mut self, classification: RetryClassification) {
        self.classification = Some(classification);
    }

    /// Records a completed wait and advances to the next retry.
    pub fn record_wait(&mut self, delay: Duration) {
        self.elapsed_wait = self.elapsed_wait.saturating_add(delay);
        self.attempt = self.attempt.saturating_add(1);
    }
}
