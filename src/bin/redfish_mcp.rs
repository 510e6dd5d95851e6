//! Serves Redfish tools to an MCP client over stdio.
//!
//! Usage:
//!
//! ```text
//! REDFISH_HOSTS='[{"address":"10.0.0.5"}]' REDFISH_USERNAME=admin \
//!     REDFISH_PASSWORD=secret redfish_mcp
//! ```
//!
//! Logs go to stderr so stdout carries protocol traffic only. `RUST_LOG`
//! overrides `MCP_REDFISH_LOG_LEVEL` when set.

use mockable::DefaultClock;
use redfish_mcp::config::{AppConfig, ConfigError, McpTransport};
use redfish_mcp::mcp::{RedfishToolsError, ServerInfo, StdioServer, redfish_tool_table};
use redfish_mcp::redfish::adapters::{HttpTransportFactory, SsdpProbe, TracingEventSink};
use redfish_mcp::redfish::services::{
    DiscoveryLoop, HostRegistry, HostRegistryError, RedfishAccess, SessionSettings,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot install logging: {0}")]
    Logging(String),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error("cannot load static hosts: {0}")]
    Hosts(#[from] HostRegistryError),
    #[error("cannot build tool table: {0}")]
    Tools(#[from] RedfishToolsError),
    #[error("stdio transport failed: {0}")]
    Stdio(#[source] std::io::Error),
}

fn main() -> Result<(), BoxError> {
    let config = AppConfig::from_env().map_err(ServerError::from)?;
    install_logging(&config)?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServerError::RuntimeInit)?;
    let outcome = runtime.block_on(run(&config));
    // A pending stdin read holds a blocking thread that never returns.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    outcome.map_err(Into::into)
}

fn install_logging(config: &AppConfig) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level().directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ServerError::Logging(err.to_string()))
}

async fn run(config: &AppConfig) -> Result<(), ServerError> {
    let requested = config.transport();
    if !requested.is_served() {
        warn!(requested = requested.as_str(), "transport not supported, falling back to stdio");
    }
    info!(transport = McpTransport::Stdio.as_str(), "starting MCP server");

    let settings = SessionSettings::new(
        config.backoff(),
        Arc::new(TracingEventSink::new()),
        Arc::new(DefaultClock),
    );
    let registry = Arc::new(HostRegistry::new(
        HttpTransportFactory::new(config.request_timeout()),
        settings,
        config.defaults().clone(),
    ));
    registry.load_static(config.hosts().to_vec()).await?;
    info!(hosts = registry.len(), "host registry ready");

    let discovery = config.discovery();
    let discovery_handle = discovery.enabled.then(|| {
        info!(interval_secs = discovery.interval.as_secs(), "starting discovery");
        DiscoveryLoop::spawn(SsdpProbe::new(discovery.timeout), Arc::clone(&registry), discovery.interval)
    });

    let access = RedfishAccess::new(Arc::clone(&registry));
    let server = StdioServer::new(redfish_tool_table(&access)?, ServerInfo::default());
    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received");
                interrupt.cancel();
            }
            Err(err) => warn!(error = %err, "cannot listen for interrupts"),
        }
    });

    let served = server
        .serve(tokio::io::stdin(), tokio::io::stdout(), shutdown.clone())
        .await;
    shutdown.cancel();

    if let Some(handle) = discovery_handle {
        handle.shutdown().await;
    }
    registry.shutdown().await;
    info!("all sessions closed");
    served.map_err(ServerError::Stdio)
}
