//! Event sink that forwards access events to `tracing`.

use crate::redfish::{
    domain::{AccessEvent, EventOutcome},
    ports::AccessEventSink,
};
use tracing::{debug, info, warn};

/// Production event sink writing one structured log event per access event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Creates the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AccessEventSink for TracingEventSink {
    fn record(&self, event: AccessEvent) {
        let AccessEvent {
            invocation,
            host,
            operation,
            attempt,
            outcome,
            delay,
            detail,
        } = event;
        let delay_ms = delay.map(|value| value.as_millis());
        let detail_text = detail.unwrap_or_default();

        match outcome {
            EventOutcome::RetryScheduled
            | EventOutcome::Exhausted
            | EventOutcome::AuthenticationFailed => warn!(
                %invocation, %host, operation = operation.as_str(), attempt, %outcome, ?delay_ms, detail = detail_text.as_str(),
                "redfish access event"
            ),
            EventOutcome::Rejected
            | EventOutcome::Cancelled
            | EventOutcome::Invalidated
            | EventOutcome::Authenticated
            | EventOutcome::LoggedOut => info!(
                %invocation, %host, operation = operation.as_str(), attempt, %outcome, detail = detail_text.as_str(),
                "redfish access event"
            ),
            EventOutcome::Succeeded => debug!(
                %invocation, %host, operation = operation.as_str(), attempt, %outcome,
                "redfish access event"
            ),
        }
    }
}
