//! Port contracts for Redfish access.

mod events;
mod probe;
mod transport;

pub use events::AccessEventSink;
pub use probe::{DiscoveryError, DiscoveryProbe, DiscoveryResult};
pub use transport::{RedfishTransport, TransportFactory, TransportResult};
