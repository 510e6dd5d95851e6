//! Resilient access to a fleet of Redfish management controllers.
//!
//! Hosts are configured statically or found through SSDP discovery. Each host
//! owns a session that keeps its authentication state and retries transient
//! failures with exponential backoff. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
