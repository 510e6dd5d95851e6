//! Error types for Redfish domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing Redfish access domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RedfishDomainError {
    /// The host address is empty after trimming.
    #[error("host address must not be empty")]
    EmptyHostAddress,

    /// The host address contains whitespace, path separators or credentials.
    #[error("host address '{0}' contains invalid characters")]
    InvalidHostAddress(String),

    /// A port value falls outside `1..=65535`.
    #[error("port must be between 1 and 65535, got: {0}")]
    PortOutOfRange(i64),

    /// The authentication method is neither `basic` nor `session`.
    #[error("invalid auth_method: {0} (must be one of: basic, session)")]
    UnknownAuthMethod(String),

    /// The initial backoff delay is zero.
    #[error("initial retry delay must be greater than zero")]
    ZeroInitialDelay,

    /// The maximum backoff delay is shorter than the initial delay.
    #[error("maximum retry delay {max_delay:?} is shorter than initial delay {initial_delay:?}")]
    MaxDelayBelowInitial {
        /// Configured initial delay.
        initial_delay: std::time::Duration,
        /// Configured maximum delay.
        max_delay: std::time::Duration,
    },

    /// The backoff factor is below `1.0` or not finite.
    #[error("backoff factor must be a finite number >= 1.0, got: {0}")]
    InvalidBackoffFactor(String),

    /// A resource path is not a host-relative path.
    #[error("resource path '{0}' must be a path on the host starting with a single '/'")]
    InvalidResourcePath(String),

    /// An SSDP response carried no `AL` header.
    #[error("SSDP response has no AL header")]
    MissingServiceRoot,

    /// An advertised service root is not an `https://.../redfish/v1` URI.
    #[error("advertised service root '{0}' is not a Redfish service root")]
    InvalidServiceRoot(String),
}
