//! Process configuration read from environment variables.
//!
//! Every value is validated when the configuration is loaded so the server
//! never starts with a setting it would reject later.

use crate::redfish::domain::{
    AuthMethod, BackoffConfig, DEFAULT_REDFISH_PORT, HostConfig, HostDefaults, HostRecord, RedfishDomainError,
    Secret,
};
use camino::Utf8PathBuf;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOSTS: &str = r#"[{"address":"127.0.0.1"}]"#;
const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 30;
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_DELAY_SECS: f64 = 1.0;
const DEFAULT_MAX_DELAY_SECS: f64 = 60.0;
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors, each naming the offending variable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{variable}: {reason}")]
pub struct ConfigError {
    variable: &'static str,
    reason: String,
}

impl ConfigError {
    fn new(variable: &'static str, reason: impl Into<String>) -> Self {
        Self {
            variable,
            reason: reason.into(),
        }
    }

    /// Returns the name of the variable that failed validation.
    #[must_use]
    pub const fn variable(&self) -> &'static str {
        self.variable
    }

    /// Returns the validation failure.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Transport requested for talking to the MCP client.
///
/// Only stdio is served; the HTTP transports are recognised so that a
/// configuration naming them can fall back to stdio with a warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum McpTransport {
    /// Newline-delimited JSON-RPC on stdin and stdout.
    #[default]
    Stdio,
    /// Server-sent events over HTTP.
    Sse,
    /// Streamable HTTP.
    StreamableHttp,
}

impl McpTransport {
    /// Returns the configuration spelling of the transport.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable-http",
        }
    }

    /// Returns whether this process can serve the transport.
    #[must_use]
    pub const fn is_served(self) -> bool {
        matches!(self, Self::Stdio)
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Everything including per-request detail.
    Debug,
    /// Lifecycle events and retries.
    #[default]
    Info,
    /// Problems that were recovered from.
    Warning,
    /// Failures only.
    Error,
    /// Treated as [`LogLevel::Error`].
    Critical,
}

impl LogLevel {
    /// Returns the matching `tracing` filter directive.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

/// Discovery loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Whether the discovery loop runs at all.
    pub enabled: bool,
    /// Time between probes.
    pub interval: Duration,
    /// Time each probe spends collecting responses.
    pub timeout: Duration,
}

/// Fully validated process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    hosts: Vec<HostConfig>,
    defaults: HostDefaults,
    backoff: BackoffConfig,
    discovery: DiscoverySettings,
    request_timeout: Duration,
    transport: McpTransport,
    log_level: LogLevel,
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through `lookup`.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_lookup<L>(lookup: L) -> ConfigResult<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = HostDefaults {
            port: vars.port("REDFISH_PORT")?,
            username: vars.raw("REDFISH_USERNAME").unwrap_or_default(),
            password: Secret::new(vars.raw("REDFISH_PASSWORD").unwrap_or_default()),
            auth_method: vars.auth_method("REDFISH_AUTH_METHOD")?,
            ca_cert_path: vars.raw("REDFISH_SERVER_CA_CERT").map(Utf8PathBuf::from),
        };
        let hosts = vars.hosts("REDFISH_HOSTS", &defaults)?;
        let backoff = BackoffConfig::new(
            vars.parsed("REDFISH_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            vars.seconds("REDFISH_INITIAL_DELAY", DEFAULT_INITIAL_DELAY_SECS)?,
            vars.seconds("REDFISH_MAX_DELAY", DEFAULT_MAX_DELAY_SECS)?,
            vars.parsed("REDFISH_BACKOFF_FACTOR", DEFAULT_BACKOFF_FACTOR)?,
            vars.flag("REDFISH_JITTER", true)?,
        )
        .map_err(|err| {
            let variable = match err {
                RedfishDomainError::ZeroInitialDelay => "REDFISH_INITIAL_DELAY",
                RedfishDomainError::MaxDelayBelowInitial { .. } => "REDFISH_MAX_DELAY",
                _ => "REDFISH_BACKOFF_FACTOR",
            };
            ConfigError::new(variable, err.to_string())
        })?;
        let discovery = DiscoverySettings {
            enabled: vars.flag("REDFISH_DISCOVERY_ENABLED", false)?,
            interval: vars.whole_seconds("REDFISH_DISCOVERY_INTERVAL", DEFAULT_DISCOVERY_INTERVAL_SECS)?,
            timeout: vars.whole_seconds("REDFISH_DISCOVERY_TIMEOUT", DEFAULT_DISCOVERY_TIMEOUT_SECS)?,
        };

        Ok(Self {
            hosts,
            defaults,
            backoff,
            discovery,
            request_timeout: vars.whole_seconds("REDFISH_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            transport: vars.transport("MCP_TRANSPORT")?,
            log_level: vars.log_level("MCP_REDFISH_LOG_LEVEL")?,
        })
    }

    /// Returns the statically configured hosts.
    #[must_use]
    pub fn hosts(&self) -> &[HostConfig] {
        &self.hosts
    }

    /// Returns the defaults applied to hosts and discovered endpoints.
    #[must_use]
    pub const fn defaults(&self) -> &HostDefaults {
        &self.defaults
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig {
        self.backoff
    }

    /// Returns the discovery settings.
    #[must_use]
    pub const fn discovery(&self) -> DiscoverySettings {
        self.discovery
    }

    /// Returns the per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the requested MCP transport; see [`McpTransport::is_served`].
    #[must_use]
    pub const fn transport(&self) -> McpTransport {
        self.transport
    }

    /// Returns the log level.
    #[must_use]
    pub const fn log_level(&self) -> LogLevel {
        self.log_level
    }
}

struct Vars<L> {
    lookup: L,
}

impl<L> Vars<L>
where
    L: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.raw(name).map_or(Ok(default), |value| {
            value
                .parse()
                .map_err(|err| ConfigError::new(name, format!("cannot parse '{value}': {err}")))
        })
    }

    fn port(&self, name: &'static str) -> ConfigResult<u16> {
        let port: u16 = self.parsed(name, DEFAULT_REDFISH_PORT)?;
        if port == 0 {
            return Err(ConfigError::new(name, "port must be between 1 and 65535"));
        }
        Ok(port)
    }

    fn flag(&self, name: &'static str, default: bool) -> ConfigResult<bool> {
        let Some(value) = self.raw(name) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::new(name, format!("'{value}' is not a boolean"))),
        }
    }

    fn seconds(&self, name: &'static str, default: f64) -> ConfigResult<Duration> {
        let secs: f64 = self.parsed(name, default)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|err| ConfigError::new(name, format!("'{secs}' is not a valid duration: {err}")))
    }

    fn whole_seconds(&self, name: &'static str, default: u64) -> ConfigResult<Duration> {
        let secs: u64 = self.parsed(name, default)?;
        if secs == 0 {
            return Err(ConfigError::new(name, "must be at least 1 second"));
        }
        Ok(Duration::from_secs(secs))
    }

    fn auth_method(&self, name: &'static str) -> ConfigResult<AuthMethod> {
        self.raw(name).map_or(Ok(AuthMethod::default()), |value| {
            AuthMethod::try_from(value.as_str()).map_err(|err| ConfigError::new(name, err.to_string()))
        })
    }

    fn hosts(&self, name: &'static str, defaults: &HostDefaults) -> ConfigResult<Vec<HostConfig>> {
        let text = self.raw(name).unwrap_or_else(|| DEFAULT_HOSTS.to_owned());
        let records: Vec<HostRecord> = serde_json::from_str(&text)
            .map_err(|err| ConfigError::new(name, format!("expected a JSON array of hosts: {err}")))?;

        let mut seen = HashSet::new();
        let mut hosts = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let host = HostConfig::resolve(record, defaults)
                .map_err(|err| ConfigError::new(name, format!("host {index}: {err}")))?;
            if !seen.insert(host.address().clone()) {
                return Err(ConfigError::new(
                    name,
                    format!("host {index}: address {} is listed twice", host.address()),
                ));
            }
            hosts.push(host);
        }
        Ok(hosts)
    }

    fn transport(&self, name: &'static str) -> ConfigResult<McpTransport> {
        let Some(value) = self.raw(name) else {
            return Ok(McpTransport::default());
        };
        [McpTransport::Stdio, McpTransport::Sse, McpTransport::StreamableHttp]
            .into_iter()
            .find(|transport| value.eq_ignore_ascii_case(transport.as_str()))
            .ok_or_else(|| {
                ConfigError::new(
                    name,
                    format!("'{value}' is not one of stdio, sse, streamable-http"),
                )
            })
    }

    fn log_level(&self, name: &'static str) -> ConfigResult<LogLevel> {
        let Some(value) = self.raw(name) else {
            return Ok(LogLevel::default());
        };
        match value.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::new(
                name,
                format!("'{value}' is not one of DEBUG, INFO, WARNING, ERROR, CRITICAL"),
            )),
        }
    }
}
