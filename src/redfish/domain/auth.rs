//! Authentication methods, credentials and per-host authentication state.

use super::RedfishDomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a host authenticates requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// HTTP basic credentials sent with every request.
    Basic,
    /// A session token obtained from the host's session service.
    #[default]
    Session,
}

impl AuthMethod {
    /// Returns the canonical configuration representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AuthMethod {
    type Error = RedfishDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "session" => Ok(Self::Session),
            _ => Err(RedfishDomainError::UnknownAuthMethod(value.to_owned())),
        }
    }
}

/// String whose contents never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns whether the secret is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Secret(***)")
    }
}

/// Login material for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: Secret,
    method: AuthMethod,
}

impl Credentials {
    /// Creates login credentials.
    #[must_use]
    pub const fn new(username: String, password: Secret, method: AuthMethod) -> Self {
        Self {
            username,
            password,
            method,
        }
    }

    /// Returns the user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub const fn password(&self) -> &Secret {
        &self.password
    }

    /// Returns the authentication method.
    #[must_use]
    pub const fn method(&self) -> AuthMethod {
        self.method
    }
}

/// Proof of authentication attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// Basic credentials validated at login.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: Secret,
    },
    /// Session token issued by the session service.
    Session {
        /// Value of the `X-Auth-Token` header.
        token: Secret,
        /// Session resource URI used to terminate the session.
        location: Option<String>,
    },
}

impl AuthToken {
    /// Builds a basic-auth token from credentials.
    #[must_use]
    pub fn basic(credentials: &Credentials) -> Self {
        Self::Basic {
            username: credentials.username().to_owned(),
            password: credentials.password().clone(),
        }
    }

    /// Builds a session token.
    #[must_use]
    pub fn session(token: impl Into<String>, location: Option<String>) -> Self {
        Self::Session {
            token: Secret::new(token),
            location,
        }
    }

    /// Returns the method that produced this token.
    #[must_use]
    pub const fn method(&self) -> AuthMethod {
        match self {
            Self::Basic { .. } => AuthMethod::Basic,
            Self::Session { .. } => AuthMethod::Session,
        }
    }
}

/// Authentication state of a host session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No usable credentials are held.
    #[default]
    Unauthenticated,
    /// Login succeeded.
    Authenticated {
        /// Token or credentials attached to requests.
        token: AuthToken,
        /// Time of the successful login.
        established_at: DateTime<Utc>,
    },
    /// The last login exhausted its retries or was rejected.
    Failed {
        /// Rendered terminal failure.
        last_error: String,
        /// Time the login gave up.
        failed_at: DateTime<Utc>,
    },
}

impl AuthState {
    /// Returns the canonical state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated { .. } => "authenticated",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns the active token when authenticated.
    #[must_use]
    pub const fn token(&self) -> Option<&AuthToken> {
        match self {
            Self::Authenticated { token, .. } => Some(token),
            Self::Unauthenticated | Self::Failed { .. } => None,
        }
    }

    /// Returns whether the state holds a usable token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
