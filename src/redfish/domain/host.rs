//! Host identity and per-host connection settings.

use super::{AuthMethod, Credentials, RedfishDomainError, Secret};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Port used when neither the host nor the global defaults name one.
pub const DEFAULT_REDFISH_PORT: u16 = 443;

/// Case-insensitive identity of a Redfish host.
///
/// The address is trimmed and lowercased. IPv6 literals are stored without
/// surrounding brackets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostAddress(String);

impl HostAddress {
    /// Creates a validated host address.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishDomainError::EmptyHostAddress`] for blank input and
    /// [`RedfishDomainError::InvalidHostAddress`] when the value contains
    /// whitespace, `/` or `@`.
    pub fn new(value: impl Into<String>) -> Result<Self, RedfishDomainError> {
        let lowered = value.into().trim().to_ascii_lowercase();
        let normalized = lowered
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .map_or_else(|| lowered.clone(), str::to_owned);

        if normalized.is_empty() {
            return Err(RedfishDomainError::EmptyHostAddress);
        }

        let has_invalid_character = normalized
            .chars()
            .any(|character| character.is_whitespace() || matches!(character, '/' | '@'));
        if has_invalid_character {
            return Err(RedfishDomainError::InvalidHostAddress(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address in the form used inside a URL authority.
    #[must_use]
    pub fn url_host(&self) -> Cow<'_, str> {
        if self.0.contains(':') {
            Cow::Owned(format!("[{}]", self.0))
        } else {
            Cow::Borrowed(&self.0)
        }
    }
}

impl AsRef<str> for HostAddress {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<String> for HostAddress {
    type Error = RedfishDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HostAddress> for String {
    fn from(value: HostAddress) -> Self {
        value.0
    }
}

/// Settings inherited by hosts that leave a field unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDefaults {
    /// Default management port.
    pub port: u16,
    /// Default user name.
    pub username: String,
    /// Default password.
    pub password: Secret,
    /// Default authentication method.
    pub auth_method: AuthMethod,
    /// Default CA bundle used to verify host certificates.
    pub ca_cert_path: Option<Utf8PathBuf>,
}

impl Default for HostDefaults {
    fn default() -> Self {
        Self {
            port: DEFAULT_REDFISH_PORT,
            username: String::new(),
            password: Secret::default(),
            auth_method: AuthMethod::default(),
            ca_cert_path: None,
        }
    }
}

/// Raw host entry as it appears in the JSON host list.
///
/// Empty strings are treated the same as absent fields so that the global
/// defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostRecord {
    /// Hostname or IP address.
    pub address: String,
    /// Management port.
    #[serde(default)]
    pub port: Option<i64>,
    /// User name.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
    /// Authentication method name.
    #[serde(default)]
    pub auth_method: Option<String>,
    /// CA bundle path.
    #[serde(default)]
    pub tls_server_ca_cert: Option<String>,
}

/// Immutable description of a Redfish target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    address: HostAddress,
    port: u16,
    username: String,
    password: Secret,
    auth_method: AuthMethod,
    ca_cert_path: Option<Utf8PathBuf>,
}

impl HostConfig {
    /// Creates a host configuration that inherits every setting from
    /// `defaults`.
    #[must_use]
    pub fn new(address: HostAddress, defaults: &HostDefaults) -> Self {
        Self {
            address,
            port: defaults.port,
            username: defaults.username.clone(),
            password: defaults.password.clone(),
            auth_method: defaults.auth_method,
            ca_cert_path: defaults.ca_cert_path.clone(),
        }
    }

    /// Resolves a raw host entry against the global defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishDomainError`] when the address, port or
    /// authentication method is invalid.
    pub fn resolve(record: HostRecord, defaults: &HostDefaults) -> Result<Self, RedfishDomainError> {
        let HostRecord {
            address,
            port,
            username,
            password,
            auth_method,
            tls_server_ca_cert,
        } = record;

        let mut config = Self::new(HostAddress::new(address)?, defaults);
        if let Some(raw_port) = port {
            config.port = validate_port(raw_port)?;
        }
        if let Some(name) = non_empty(username) {
            config.username = name;
        }
        if let Some(secret) = non_empty(password) {
            config.password = Secret::new(secret);
        }
        if let Some(method) = non_empty(auth_method) {
            config.auth_method = AuthMethod::try_from(method.as_str())?;
        }
        if let Some(path) = non_empty(tls_server_ca_cert) {
            config.ca_cert_path = Some(Utf8PathBuf::from(path));
        }
        Ok(config)
    }

    /// Overrides the management port.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishDomainError::PortOutOfRange`] for port `0`.
    pub fn with_port(mut self, port: u16) -> Result<Self, RedfishDomainError> {
        self.port = validate_port(i64::from(port))?;
        Ok(self)
    }

    /// Overrides the credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Secret::new(password);
        self
    }

    /// Overrides the authentication method.
    #[must_use]
    pub const fn with_auth_method(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    /// Overrides the CA bundle path.
    #[must_use]
    pub fn with_ca_cert_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Returns the host identity.
    #[must_use]
    pub const fn address(&self) -> &HostAddress {
        &self.address
    }

    /// Returns the management port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the authentication method.
    #[must_use]
    pub const fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    /// Returns the CA bundle path, if any.
    #[must_use]
    pub fn ca_cert_path(&self) -> Option<&camino::Utf8Path> {
        self.ca_cert_path.as_deref()
    }

    /// Returns the HTTPS base URL of the host.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.address.url_host(), self.port)
    }

    /// Returns the login credentials for this host.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone(), self.auth_method)
    }

    /// Returns a copy with user name and password removed.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            username: String::new(),
            password: Secret::default(),
            ..self.clone()
        }
    }

    /// Returns the public address and port of the host.
    #[must_use]
    pub fn endpoint(&self) -> EndpointSummary {
        EndpointSummary {
            address: self.address.as_str().to_owned(),
            port: self.port,
        }
    }
}

/// Address and port pair reported to tool callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    /// Host address.
    pub address: String,
    /// Management port.
    pub port: u16,
}

fn validate_port(value: i64) -> Result<u16, RedfishDomainError> {
    u16::try_from(value)
        .ok()
        .filter(|port| *port != 0)
        .ok_or(RedfishDomainError::PortOutOfRange(value))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
