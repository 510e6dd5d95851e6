//! Observability sink port.

use crate::redfish::domain::AccessEvent;

/// Receives one event per attempt and per authentication transition.
///
/// Implementations must not block; they are called from request paths.
pub trait AccessEventSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: AccessEvent);
}
