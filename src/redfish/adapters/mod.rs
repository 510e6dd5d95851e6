//! Adapter implementations for the Redfish access ports.

pub mod memory;

mod http;
mod ssdp;
mod tracing_sink;

pub use http::{DEFAULT_REQUEST_TIMEOUT, HttpRedfishTransport, HttpTransportFactory};
pub use ssdp::{DEFAULT_PROBE_TIMEOUT, SsdpProbe};
pub use tracing_sink::TracingEventSink;
