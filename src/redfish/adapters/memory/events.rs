//! Event sink that keeps every event for later inspection.

use crate::redfish::{
    domain::{AccessEvent, EventOutcome},
    ports::AccessEventSink,
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe in-memory event recorder.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<AccessEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<AccessEvent> {
        self.lock().clone()
    }

    /// Returns the outcomes of the recorded events in emission order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<EventOutcome> {
        self.lock().iter().map(|event| event.outcome).collect()
    }

    /// Returns the recorded events for one operation.
    #[must_use]
    pub fn for_operation(&self, operation: &str) -> Vec<AccessEvent> {
        self.lock()
            .iter()
            .filter(|event| event.operation == operation)
            .cloned()
            .collect()
    }

    /// Discards every recorded event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AccessEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccessEventSink for RecordingEventSink {
    fn record(&self, event: AccessEvent) {
        self.lock().push(event);
    }
}
