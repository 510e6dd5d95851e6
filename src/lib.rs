//! Redfish MCP: resilient Redfish access for AI agents.
//!
//! This crate lets agents read Redfish resources from a fleet of baseboard
//! management controllers through Model Context Protocol tools. Each host
//! keeps one authenticated session, transient failures are retried with
//! exponential backoff, and hosts can be found on the local network through
//! SSDP discovery.
//!
//! # Architecture
//!
//! The Redfish layer follows hexagonal architecture principles:
//!
//! - **Domain**: Host identity, retry policy and failure classification
//! - **Ports**: Transport, discovery probe and event sink traits
//! - **Adapters**: HTTPS, SSDP, tracing and in-memory implementations
//! - **Services**: Retry executor, host sessions, registry and access facade
//!
//! # Modules
//!
//! - [`redfish`]: Sessions, retries, host registry and discovery
//! - [`mcp`]: Tool table and the stdio JSON-RPC server
//! - [`config`]: Environment-driven process configuration

pub mod config;
pub mod mcp;
pub mod redfish;
