//! In-memory adapters for tests and local experiments.

mod events;
mod probe;
mod transport;

pub use events::RecordingEventSink;
pub use probe::StaticDiscoveryProbe;
pub use transport::{ScriptedRedfishTransport, ScriptedTransportFactory};
