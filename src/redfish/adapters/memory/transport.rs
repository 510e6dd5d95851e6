//! Scripted in-memory transport for deterministic tests.

use crate::redfish::{
    domain::{AuthToken, Credentials, HostConfig, RedfishFailure, RedfishRequest, RedfishResponse},
    ports::{RedfishTransport, TransportFactory, TransportResult},
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Transport factory whose hosts answer from per-host scripts.
///
/// Scripted results are consumed in order. Once a script is empty, logins
/// issue a fresh session token and requests answer `200 OK` with the
/// host's fallback body.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransportFactory {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    hosts: HashMap<String, HostScript>,
    unbuildable: HashSet<String>,
    builds: usize,
}

#[derive(Debug, Default)]
struct HostScript {
    logins: VecDeque<TransportResult<AuthToken>>,
    responses: VecDeque<TransportResult<RedfishResponse>>,
    fallback: Option<RedfishResponse>,
    latency: Duration,
    login_calls: usize,
    send_calls: usize,
    logout_calls: usize,
    sent: Vec<RedfishRequest>,
    issued_tokens: usize,
}

fn host_key(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

impl ScriptedTransportFactory {
    /// Creates a factory with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next unscripted login to `address`.
    pub fn script_login(&self, address: &str, result: TransportResult<AuthToken>) {
        self.with_host(address, |script| script.logins.push_back(result));
    }

    /// Queues the result of the next unscripted request to `address`.
    pub fn script_response(&self, address: &str, result: TransportResult<RedfishResponse>) {
        self.with_host(address, |script| script.responses.push_back(result));
    }

    /// Queues `count` copies of a status response for `address`.
    pub fn script_status(&self, address: &str, status: u16, count: usize) {
        self.with_host(address, |script| {
            script.responses.extend(
                std::iter::repeat_with(|| Ok(RedfishResponse::new(status, BTreeMap::new(), json!({}))))
                    .take(count),
            );
        });
    }

    /// Sets the response returned once the script for `address` is empty.
    pub fn set_fallback_response(&self, address: &str, response: RedfishResponse) {
        self.with_host(address, |script| script.fallback = Some(response));
    }

    /// Delays every exchange with `address` by `latency`.
    pub fn set_latency(&self, address: &str, latency: Duration) {
        self.with_host(address, |script| script.latency = latency);
    }

    /// Makes transport construction for `address` fail.
    pub fn fail_build(&self, address: &str) {
        self.lock().unbuildable.insert(host_key(address));
    }

    /// Returns the number of login calls made to `address`.
    #[must_use]
    pub fn login_calls(&self, address: &str) -> usize {
        self.read_host(address, |script| script.login_calls)
    }

    /// Returns the number of requests sent to `address`.
    #[must_use]
    pub fn send_calls(&self, address: &str) -> usize {
        self.read_host(address, |script| script.send_calls)
    }

    /// Returns the number of logout calls made to `address`.
    #[must_use]
    pub fn logout_calls(&self, address: &str) -> usize {
        self.read_host(address, |script| script.logout_calls)
    }

    /// Returns the paths requested from `address`, in order.
    #[must_use]
    pub fn sent_paths(&self, address: &str) -> Vec<String> {
        self.read_host(address, |script| {
            script
                .sent
                .iter()
                .map(|request| request.path().to_owned())
                .collect()
        })
    }

    /// Returns the number of network calls of any kind across all hosts.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock()
            .hosts
            .values()
            .map(|script| script.login_calls + script.send_calls + script.logout_calls)
            .sum()
    }

    /// Returns the number of transports built.
    #[must_use]
    pub fn builds(&self) -> usize {
        self.lock().builds
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_host(&self, address: &str, apply: impl FnOnce(&mut HostScript)) {
        apply(self.lock().hosts.entry(host_key(address)).or_default());
    }

    fn read_host<R: Default>(&self, address: &str, read: impl FnOnce(&HostScript) -> R) -> R {
        self.lock()
            .hosts
            .get(&host_key(address))
            .map(read)
            .unwrap_or_default()
    }
}

impl TransportFactory for ScriptedTransportFactory {
    type Transport = ScriptedRedfishTransport;

    fn build(&self, host: &HostConfig) -> TransportResult<Self::Transport> {
        let key = host_key(host.address().as_str());
        let mut state = self.lock();
        if state.unbuildable.contains(&key) {
            return Err(RedfishFailure::InvalidInput(format!(
                "transport for {key} is configured to fail"
            )));
        }
        state.builds = state.builds.saturating_add(1);
        Ok(ScriptedRedfishTransport {
            key,
            state: Arc::clone(&self.state),
        })
    }
}

/// Transport for one host of a [`ScriptedTransportFactory`].
#[derive(Debug, Clone)]
pub struct ScriptedRedfishTransport {
    key: String,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedRedfishTransport {
    async fn exchange<R>(&self, step: impl FnOnce(&mut HostScript) -> R) -> R {
        let latency = self.with_script(|script| script.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.with_script(step)
    }

    fn with_script<R>(&self, step: impl FnOnce(&mut HostScript) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        step(state.hosts.entry(self.key.clone()).or_default())
    }
}

#[async_trait]
impl RedfishTransport for ScriptedRedfishTransport {
    async fn login(&self, _credentials: &Credentials) -> TransportResult<AuthToken> {
        let key = self.key.clone();
        self.exchange(move |script| {
            script.login_calls = script.login_calls.saturating_add(1);
            script.logins.pop_front().unwrap_or_else(|| {
                script.issued_tokens = script.issued_tokens.saturating_add(1);
                let token = format!("{key}-token-{}", script.issued_tokens);
                let location = format!("/redfish/v1/SessionService/Sessions/{}", script.issued_tokens);
                Ok(AuthToken::session(token, Some(location)))
            })
        })
        .await
    }

    async fn send(&self, _token: &AuthToken, request: &RedfishRequest) -> TransportResult<RedfishResponse> {
        self.exchange(|script| {
            script.send_calls = script.send_calls.saturating_add(1);
            script.sent.push(request.clone());
            script.responses.pop_front().unwrap_or_else(|| {
                Ok(script
                    .fallback
                    .clone()
                    .unwrap_or_else(|| RedfishResponse::ok(json!({}))))
            })
        })
        .await
    }

    async fn logout(&self, _token: &AuthToken) -> TransportResult<()> {
        self.exchange(|script| {
            script.logout_calls = script.logout_calls.saturating_add(1);
        })
        .await;
        Ok(())
    }
}
