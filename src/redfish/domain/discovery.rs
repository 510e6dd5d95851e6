//! SSDP discovery records and response parsing.

use super::{HostAddress, HostConfig, HostDefaults, RedfishDomainError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use url::Url;

/// SSDP multicast group.
pub const SSDP_MULTICAST_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250)), 1900);

/// Maximum wait, in seconds, that responders may spread their answers over.
pub const SSDP_MX: u8 = 2;

/// Search target advertised by Redfish services.
pub const REDFISH_SEARCH_TARGET: &str = "urn:dmtf-org:service:redfish-rest:1";

/// A Redfish endpoint observed in a probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRecord {
    address: HostAddress,
    port: u16,
    service_root: String,
}

impl DiscoveryRecord {
    /// Creates a discovery record.
    #[must_use]
    pub const fn new(address: HostAddress, port: u16, service_root: String) -> Self {
        Self {
            address,
            port,
            service_root,
        }
    }

    /// Returns the responder's address.
    #[must_use]
    pub const fn address(&self) -> &HostAddress {
        &self.address
    }

    /// Returns the advertised port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the advertised service root URI.
    #[must_use]
    pub fn service_root(&self) -> &str {
        &self.service_root
    }

    /// Converts the record into a host configuration that inherits the
    /// global credentials and authentication settings.
    #[must_use]
    pub fn to_host_config(&self, defaults: &HostDefaults) -> HostConfig {
        let inherited = HostDefaults {
            port: self.port,
            ..defaults.clone()
        };
        HostConfig::new(self.address.clone(), &inherited)
    }
}

/// Builds the SSDP `M-SEARCH` request for Redfish services.
#[must_use]
pub fn m_search_request() -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\nHOST: {SSDP_MULTICAST_ADDR}\r\nMAN: \"ssdp:discover\"\r\nMX: {SSDP_MX}\r\nST: {REDFISH_SEARCH_TARGET}\r\n\r\n"
    )
}

/// Extracts the `AL` header value from an SSDP response.
#[must_use]
pub fn parse_al_header(response: &str) -> Option<&str> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("AL")
            .then(|| value.trim())
            .filter(|uri| !uri.is_empty())
    })
}

/// Validates that `uri` is an `https` Redfish service root.
///
/// # Errors
///
/// Returns [`RedfishDomainError::InvalidServiceRoot`] unless the URI uses the
/// `https` scheme, names a host and has the path `/redfish/v1` with an
/// optional trailing slash.
pub fn validate_service_root(uri: &str) -> Result<Url, RedfishDomainError> {
    let invalid = || RedfishDomainError::InvalidServiceRoot(uri.to_owned());
    let parsed = Url::parse(uri).map_err(|_| invalid())?;

    let is_service_root = parsed.scheme() == "https"
        && parsed.host_str().is_some_and(|host| !host.is_empty())
        && matches!(parsed.path(), "/redfish/v1" | "/redfish/v1/");
    if !is_service_root {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Converts one SSDP response datagram into a discovery record.
///
/// The record carries the datagram's source address and the port advertised
/// in the service root (443 when omitted).
///
/// # Errors
///
/// Returns [`RedfishDomainError::MissingServiceRoot`] when no `AL` header is
/// present and [`RedfishDomainError::InvalidServiceRoot`] when the advertised
/// URI is not a Redfish service root.
pub fn parse_ssdp_response(payload: &str, source: IpAddr) -> Result<DiscoveryRecord, RedfishDomainError> {
    let al_uri = parse_al_header(payload).ok_or(RedfishDomainError::MissingServiceRoot)?;
    let service_root = validate_service_root(al_uri)?;
    let port = service_root.port_or_known_default().unwrap_or(super::DEFAULT_REDFISH_PORT);
    let address = HostAddress::new(source.to_string())?;
    Ok(DiscoveryRecord::new(address, port, al_uri.to_owned()))
}
