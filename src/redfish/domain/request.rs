//! Redfish request and response value objects.

use super::{RedfishDomainError, RedfishFailure};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP methods supported against Redfish resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Read a resource.
    Get,
    /// Create a resource or invoke an action.
    Post,
    /// Update a resource.
    Patch,
    /// Delete a resource.
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One request against a host-relative resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedfishRequest {
    method: HttpMethod,
    path: String,
    body: Option<Value>,
}

impl RedfishRequest {
    /// Creates a request with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishDomainError::InvalidResourcePath`] when `path` does
    /// not start with `/` or could name another authority (`//host`, or any
    /// backslash, which URL parsing treats as a slash).
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        body: Option<Value>,
    ) -> Result<Self, RedfishDomainError> {
        let normalized = path.into().trim().to_owned();
        if !is_host_relative(&normalized) {
            return Err(RedfishDomainError::InvalidResourcePath(normalized));
        }
        Ok(Self {
            method,
            path: normalized,
            body,
        })
    }

    /// Creates a `GET` request.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishDomainError::InvalidResourcePath`] for relative paths.
    pub fn get(path: impl Into<String>) -> Result<Self, RedfishDomainError> {
        Self::new(HttpMethod::Get, path, None)
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the resource path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the JSON body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Response headers preserved for tool callers.
pub const PRESERVED_HEADERS: [&str; 5] = ["Allow", "Content-Type", "Content-Encoding", "ETag", "Link"];

/// Response returned by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedfishResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Value,
}

impl RedfishResponse {
    /// Creates a response.
    #[must_use]
    pub const fn new(status: u16, headers: BTreeMap<String, String>, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a `200 OK` response with no headers.
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self::new(200, BTreeMap::new(), body)
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the preserved headers.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns the parsed body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Returns whether the status is `2xx`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-success response into a [`RedfishFailure::Status`].
    ///
    /// The failure message is taken from the Redfish extended error body
    /// (`error.message`) when present.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishFailure::Status`] for any status outside `2xx`.
    pub fn into_result(self) -> Result<Self, RedfishFailure> {
        if self.is_success() {
            return Ok(self);
        }

        let message = self
            .body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map_or_else(|| default_reason(self.status).to_owned(), str::to_owned);
        Err(RedfishFailure::status(self.status, message))
    }

    /// Renders the response as `{"headers": {...}, "data": ...}`.
    #[must_use]
    pub fn into_payload(self) -> Value {
        json!({
            "headers": self.headers,
            "data": self.body,
        })
    }
}

fn is_host_relative(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') && !path.chars().any(char::is_control)
}

const fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "unexpected status",
    }
}
