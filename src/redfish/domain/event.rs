//! Observability events emitted by the access layer.

use super::HostAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Correlates the events of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Creates a new random invocation identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an invocation identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// What happened at the point an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The attempt succeeded.
    Succeeded,
    /// The attempt failed and another attempt is scheduled.
    RetryScheduled,
    /// The attempt failed permanently.
    Rejected,
    /// The attempt failed transiently but the retry budget is spent.
    Exhausted,
    /// The caller cancelled the operation.
    Cancelled,
    /// The session obtained credentials.
    Authenticated,
    /// The session gave up logging in.
    AuthenticationFailed,
    /// The host rejected the session's credentials and they were dropped.
    Invalidated,
    /// The session was logged out.
    LoggedOut,
}

impl EventOutcome {
    /// Returns the canonical outcome name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::RetryScheduled => "retry_scheduled",
            Self::Rejected => "rejected",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
            Self::Authenticated => "authenticated",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Invalidated => "invalidated",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Structured record of one attempt or authentication transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Logical call the event belongs to.
    pub invocation: InvocationId,
    /// Host the operation targeted.
    pub host: HostAddress,
    /// Operation name, such as `login` or `GET /redfish/v1`.
    pub operation: String,
    /// Number of retries performed before this event.
    pub attempt: u32,
    /// Outcome at this point.
    pub outcome: EventOutcome,
    /// Delay chosen before the next attempt, when one is scheduled.
    pub delay: Option<Duration>,
    /// Rendered failure or transition detail.
    pub detail: Option<String>,
}

impl AccessEvent {
    /// Creates an event without delay or detail.
    #[must_use]
    pub fn new(
        invocation: InvocationId,
        host: HostAddress,
        operation: impl Into<String>,
        attempt: u32,
        outcome: EventOutcome,
    ) -> Self {
        Self {
            invocation,
            host,
            operation: operation.into(),
            attempt,
            outcome,
            delay: None,
            detail: None,
        }
    }

    /// Sets the scheduled delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
