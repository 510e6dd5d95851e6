//! Failures produced by the Redfish transport and their retry classification.

use super::RetryClassification;
use thiserror::Error;

/// HTTP statuses that indicate a transient condition on the host.
const RETRYABLE_STATUSES: [u16; 5] = [408, 429, 502, 503, 504];

/// A failed physical attempt against a Redfish host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedfishFailure {
    /// The connection was refused, reset or could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The host name could not be resolved.
    #[error("name resolution failed: {0}")]
    Dns(String),

    /// The transport gave up waiting for the host.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The host answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the Redfish error body, or the reason
        /// phrase.
        message: String,
    },

    /// The request or the configuration behind it is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl RedfishFailure {
    /// Builds a status failure.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Classifies the failure for the retry policy.
    ///
    /// Network-level failures are retryable, as are `408`, `429`, `502`,
    /// `503`, `504` and any other `5xx`. Client errors, invalid input and
    /// cancellation are permanent.
    #[must_use]
    pub fn classification(&self) -> RetryClassification {
        match self {
            Self::Connection(_) | Self::Dns(_) | Self::Timeout(_) | Self::Transport(_) => {
                RetryClassification::Retryable
            }
            Self::Status { status, .. } => classify_status(*status),
            Self::InvalidInput(_) | Self::Cancelled => RetryClassification::NonRetryable,
        }
    }

    /// Returns the HTTP status when the host answered.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns whether the host rejected the presented credentials.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    /// Returns whether the failure is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn classify_status(status: u16) -> RetryClassification {
    if RETRYABLE_STATUSES.contains(&status) || (500..600).contains(&status) {
        RetryClassification::Retryable
    } else {
        RetryClassification::NonRetryable
    }
}
