//! Redfish transport over HTTPS using `reqwest`.

use crate::redfish::{
    domain::{
        AuthMethod, AuthToken, Credentials, HostConfig, HttpMethod, PRESERVED_HEADERS, RedfishFailure,
        RedfishRequest, RedfishResponse,
    },
    ports::{RedfishTransport, TransportFactory, TransportResult},
};
use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Certificate, Client, Method, RequestBuilder, Response};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";
const SESSION_SERVICE_PATH: &str = "/redfish/v1/SessionService";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`HttpRedfishTransport`] instances sharing one request timeout.
#[derive(Debug, Clone, Copy)]
pub struct HttpTransportFactory {
    timeout: Duration,
}

impl HttpTransportFactory {
    /// Creates a factory whose transports time out after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpTransportFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl TransportFactory for HttpTransportFactory {
    type Transport = HttpRedfishTransport;

    fn build(&self, host: &HostConfig) -> TransportResult<Self::Transport> {
        HttpRedfishTransport::new(host, self.timeout)
    }
}

/// HTTPS client bound to one Redfish host.
#[derive(Debug, Clone)]
pub struct HttpRedfishTransport {
    client: Client,
    base_url: Url,
}

impl HttpRedfishTransport {
    /// Creates a client for `host`.
    ///
    /// Certificates from the host's CA bundle are trusted in addition to the
    /// built-in roots.
    ///
    /// # Errors
    ///
    /// Returns [`RedfishFailure::InvalidInput`] when the base URL is invalid,
    /// the CA bundle cannot be read or parsed, or the client cannot be built.
    pub fn new(host: &HostConfig, timeout: Duration) -> TransportResult<Self> {
        let base_url = Url::parse(&host.base_url())
            .map_err(|err| RedfishFailure::InvalidInput(format!("invalid base URL for {}: {err}", host.address())))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut builder = Client::builder().timeout(timeout).default_headers(headers);
        if let Some(path) = host.ca_cert_path() {
            let pem = read_ca_bundle(path)?;
            let certificate = Certificate::from_pem(&pem)
                .map_err(|err| RedfishFailure::InvalidInput(format!("invalid CA bundle {path}: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|err| RedfishFailure::InvalidInput(format!("cannot build HTTP client: {err}")))?;

        Ok(Self { client, base_url })
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `reference` against the base URL.
    ///
    /// References that resolve to another scheme or host are refused so that
    /// credentials never leave the configured host. This also covers session
    /// `Location` headers supplied by the host.
    fn url(&self, reference: &str) -> TransportResult<Url> {
        let url = self
            .base_url
            .join(reference)
            .map_err(|err| RedfishFailure::InvalidInput(format!("invalid resource reference {reference}: {err}")))?;
        if url.scheme() != self.base_url.scheme() || url.host_str() != self.base_url.host_str() {
            return Err(RedfishFailure::InvalidInput(format!(
                "resource reference {reference} leaves host {}",
                self.base_url.host_str().unwrap_or_default()
            )));
        }
        Ok(url)
    }

    async fn session_login(&self, credentials: &Credentials) -> TransportResult<AuthToken> {
        let response = self
            .client
            .post(self.url(SESSIONS_PATH)?)
            .json(&json!({
                "UserName": credentials.username(),
                "Password": credentials.password().expose(),
            }))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let token = header_text(&response, AUTH_TOKEN_HEADER);
        let location = header_text(&response, "Location");
        read_response(response).await?.into_result()?;

        let session_token = token.ok_or_else(|| {
            RedfishFailure::InvalidInput("session created without an X-Auth-Token header".to_owned())
        })?;
        debug!(base_url = %self.base_url, "session created");
        Ok(AuthToken::session(session_token, location))
    }

    async fn basic_login(&self, credentials: &Credentials) -> TransportResult<AuthToken> {
        let response = self
            .client
            .get(self.url(SESSION_SERVICE_PATH)?)
            .basic_auth(credentials.username(), Some(credentials.password().expose()))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_response(response).await?.into_result()?;
        Ok(AuthToken::basic(credentials))
    }
}

#[async_trait]
impl RedfishTransport for HttpRedfishTransport {
    async fn login(&self, credentials: &Credentials) -> TransportResult<AuthToken> {
        match credentials.method() {
            AuthMethod::Session => self.session_login(credentials).await,
            AuthMethod::Basic => self.basic_login(credentials).await,
        }
    }

    async fn send(&self, token: &AuthToken, request: &RedfishRequest) -> TransportResult<RedfishResponse> {
        let builder = self
            .client
            .request(to_method(request.method()), self.url(request.path())?);
        let mut prepared = authorize(builder, token);
        if let Some(body) = request.body() {
            prepared = prepared.json(body);
        }
        let response = prepared.send().await.map_err(map_reqwest_error)?;
        read_response(response).await
    }

    async fn logout(&self, token: &AuthToken) -> TransportResult<()> {
        let AuthToken::Session {
            location: Some(location),
            ..
        } = token
        else {
            return Ok(());
        };

        let response = authorize(self.client.delete(self.url(location)?), token)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_response(response).await?.into_result()?;
        Ok(())
    }
}

fn authorize(builder: RequestBuilder, token: &AuthToken) -> RequestBuilder {
    match token {
        AuthToken::Basic { username, password } => builder.basic_auth(username, Some(password.expose())),
        AuthToken::Session { token: secret, .. } => builder.header(AUTH_TOKEN_HEADER, secret.expose()),
    }
}

const fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn header_text(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn read_response(response: Response) -> TransportResult<RedfishResponse> {
    let status = response.status().as_u16();
    let headers: BTreeMap<String, String> = PRESERVED_HEADERS
        .iter()
        .filter_map(|name| header_text(&response, name).map(|value| ((*name).to_owned(), value)))
        .collect();
    let text = response.text().await.map_err(map_reqwest_error)?;
    Ok(RedfishResponse::new(status, headers, parse_body(&text)))
}

/// Parses a response body: empty bodies become `{}` and non-JSON bodies are
/// kept as a string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

fn map_reqwest_error(err: reqwest::Error) -> RedfishFailure {
    let message = err.to_string();
    if err.is_timeout() {
        RedfishFailure::Timeout(message)
    } else if err.is_connect() {
        RedfishFailure::Connection(message)
    } else if err.is_builder() {
        RedfishFailure::InvalidInput(message)
    } else {
        RedfishFailure::Transport(message)
    }
}

fn read_ca_bundle(path: &Utf8Path) -> TransportResult<Vec<u8>> {
    let unreadable = |err: std::io::Error| RedfishFailure::InvalidInput(format!("cannot read CA bundle {path}: {err}"));
    let file_name = path
        .file_name()
        .ok_or_else(|| RedfishFailure::InvalidInput(format!("CA bundle path {path} names no file")))?;
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(unreadable)?;
    dir.read(file_name).map_err(unreadable)
}
