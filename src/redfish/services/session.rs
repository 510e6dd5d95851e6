//! Per-host authentication lifecycle and authenticated requests.

use super::retry::{Invocation, RetryError, RetryExecutor};
use crate::redfish::{
    domain::{
        AccessEvent, AuthState, AuthToken, BackoffConfig, EventOutcome, HostAddress, HostConfig,
        InvocationId, RedfishFailure, RedfishRequest, RedfishResponse, RetryContext,
    },
    ports::{AccessEventSink, RedfishTransport},
};
use mockable::Clock;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LOGIN_OPERATION: &str = "login";
const LOGOUT_OPERATION: &str = "logout";

/// Shared construction parameters for host sessions.
#[derive(Clone)]
pub struct SessionSettings {
    /// Retry policy for logins and requests.
    pub backoff: BackoffConfig,
    /// Receiver of attempt and authentication events.
    pub events: Arc<dyn AccessEventSink>,
    /// Source of authentication timestamps.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// Seed for jitter; operating-system entropy when absent.
    pub jitter_seed: Option<u64>,
}

impl SessionSettings {
    /// Creates settings with entropy-seeded jitter.
    #[must_use]
    pub fn new(
        backoff: BackoffConfig,
        events: Arc<dyn AccessEventSink>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            backoff,
            events,
            clock,
            jitter_seed: None,
        }
    }

    /// Seeds the jitter of every session built from these settings.
    #[must_use]
    pub const fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }
}

/// Errors returned by host sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Login was rejected, exhausted its retries or was cancelled.
    #[error("login to {host} failed: {source}")]
    Login {
        /// Target host.
        host: HostAddress,
        /// Terminal retry failure.
        source: RetryError,
    },
    /// The request failed.
    #[error("request to {host} failed: {source}")]
    Request {
        /// Target host.
        host: HostAddress,
        /// Terminal retry failure.
        source: RetryError,
    },
    /// The single replay after re-authentication failed.
    #[error("request to {host} failed after re-authentication: {source}")]
    Reauthentication {
        /// Target host.
        host: HostAddress,
        /// Failure of the replayed attempt.
        source: RetryError,
    },
}

impl SessionError {
    /// Returns the host the error concerns.
    #[must_use]
    pub const fn host(&self) -> &HostAddress {
        match self {
            Self::Login { host, .. } | Self::Request { host, .. } | Self::Reauthentication { host, .. } => host,
        }
    }

    /// Returns the terminal retry failure.
    #[must_use]
    pub const fn retry_error(&self) -> &RetryError {
        match self {
            Self::Login { source, .. }
            | Self::Request { source, .. }
            | Self::Reauthentication { source, .. } => source,
        }
    }

    /// Returns whether the error arose while logging in.
    #[must_use]
    pub const fn is_login(&self) -> bool {
        matches!(self, Self::Login { .. })
    }
}

/// Result type for host session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Default)]
struct SessionState {
    auth: AuthState,
    generation: u64,
    login_attempts: u64,
    last_failure: Option<RetryError>,
    retired: bool,
}

/// Authentication state and request path for one host.
///
/// Logins are serialized through a gate so that concurrent callers share one
/// login; authenticated requests run concurrently.
pub struct HostSession<T> {
    config: HostConfig,
    transport: T,
    executor: RetryExecutor,
    events: Arc<dyn AccessEventSink>,
    clock: Arc<dyn Clock + Send + Sync>,
    state: RwLock<SessionState>,
    login_gate: Mutex<()>,
}

impl<T> HostSession<T>
where
    T: RedfishTransport,
{
    /// Creates an unauthenticated session.
    #[must_use]
    pub fn new(config: HostConfig, transport: T, settings: &SessionSettings) -> Self {
        let mut executor = RetryExecutor::new(config.address().clone(), settings.backoff, Arc::clone(&settings.events));
        if let Some(seed) = settings.jitter_seed {
            executor = executor.with_jitter_seed(seed);
        }
        Self {
            config,
            transport,
            executor,
            events: Arc::clone(&settings.events),
            clock: Arc::clone(&settings.clock),
            state: RwLock::new(SessionState::default()),
            login_gate: Mutex::new(()),
        }
    }

    /// Returns the host configuration.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns a snapshot of the authentication state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.read_state().auth.clone()
    }

    /// Returns the number of successful logins so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// Logs in unless the session already holds a token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Login`] when the login is rejected, exhausts
    /// its retries or is cancelled.
    pub async fn ensure_authenticated(&self, invocation: &Invocation) -> SessionResult<()> {
        self.authenticated_token(invocation).await.map(|_| ())
    }

    /// Sends `request`, re-authenticating once if the host rejects the token.
    ///
    /// Non-success statuses are failures. A `401` on an authenticated session
    /// invalidates the token, triggers one login and replays the request
    /// exactly once without retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] describing the terminal failure.
    pub async fn request(
        &self,
        invocation: &Invocation,
        request: &RedfishRequest,
    ) -> SessionResult<RedfishResponse> {
        let (token, generation) = self.authenticated_token(invocation).await?;
        let operation = format!("{} {}", request.method().as_str(), request.path());

        match self
            .send(self.executor.config(), invocation, &operation, &token, request)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) if err.failure().is_auth_rejection() => {
                self.invalidate(generation, invocation.id(), &operation);
                let (renewed, _) = self.authenticated_token(invocation).await?;
                let single_attempt = self.executor.config().without_retries();
                self.send(&single_attempt, invocation, &operation, &renewed, request)
                    .await
                    .map_err(|source| SessionError::Reauthentication {
                        host: self.config.address().clone(),
                        source,
                    })
            }
            Err(source) => Err(SessionError::Request {
                host: self.config.address().clone(),
                source,
            }),
        }
    }

    /// Terminates the remote session, drops local credentials and retires
    /// the session.
    ///
    /// A retired session never logs in again; a login still in flight is
    /// closed on the host as soon as it completes. Remote failures are logged
    /// and ignored.
    pub async fn logout(&self) {
        let previous = {
            let mut state = self.write_state();
            state.retired = true;
            std::mem::take(&mut state.auth)
        };
        if let AuthState::Authenticated { token, .. } = previous {
            self.close_remote(&token, InvocationId::new()).await;
        }
    }

    /// Returns whether [`HostSession::logout`] has been called.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.read_state().retired
    }

    async fn close_remote(&self, token: &AuthToken, invocation: InvocationId) {
        if let Err(err) = self.transport.logout(token).await {
            warn!(host = %self.config.address(), error = %err, "remote logout failed");
        }
        self.events
            .record(self.event(invocation, LOGOUT_OPERATION, EventOutcome::LoggedOut));
        debug!(host = %self.config.address(), "session logged out");
    }

    fn retired_error(&self) -> SessionError {
        self.login_error(RetryError::new(RedfishFailure::Cancelled, RetryContext::new()))
    }

    async fn authenticated_token(&self, invocation: &Invocation) -> SessionResult<(AuthToken, u64)> {
        let observed_attempts = {
            let state = self.read_state();
            if let Some(token) = state.auth.token() {
                return Ok((token.clone(), state.generation));
            }
            state.login_attempts
        };

        let _gate = tokio::select! {
            biased;
            () = invocation.cancellation().cancelled() => {
                return Err(self.login_error(RetryError::new(RedfishFailure::Cancelled, RetryContext::new())));
            }
            guard = self.login_gate.lock() => guard,
        };

        {
            let state = self.read_state();
            if let Some(token) = state.auth.token() {
                return Ok((token.clone(), state.generation));
            }
            if state.retired {
                return Err(self.retired_error());
            }
            if state.login_attempts != observed_attempts
                && let Some(failure) = &state.last_failure
            {
                return Err(self.login_error(failure.clone()));
            }
        }

        self.login(invocation).await
    }

    async fn login(&self, invocation: &Invocation) -> SessionResult<(AuthToken, u64)> {
        let credentials = self.config.credentials();
        let transport = &self.transport;
        let login_credentials = &credentials;
        let outcome = self
            .executor
            .execute(invocation, LOGIN_OPERATION, move || transport.login(login_credentials))
            .await;

        match outcome {
            Ok(token) => {
                let generation = {
                    let mut state = self.write_state();
                    if state.retired {
                        None
                    } else {
                        state.auth = AuthState::Authenticated {
                            token: token.clone(),
                            established_at: self.clock.utc(),
                        };
                        state.generation = state.generation.saturating_add(1);
                        state.login_attempts = state.login_attempts.saturating_add(1);
                        state.last_failure = None;
                        Some(state.generation)
                    }
                };
                let Some(generation) = generation else {
                    debug!(host = %self.config.address(), "session retired during login");
                    self.close_remote(&token, invocation.id()).await;
                    return Err(self.retired_error());
                };
                self.events
                    .record(self.event(invocation.id(), LOGIN_OPERATION, EventOutcome::Authenticated));
                info!(
                    host = %self.config.address(),
                    method = %credentials.method(),
                    generation,
                    "authenticated"
                );
                Ok((token, generation))
            }
            Err(err) if err.failure().is_cancelled() => Err(self.login_error(err)),
            Err(err) => {
                {
                    let mut state = self.write_state();
                    state.auth = AuthState::Failed {
                        last_error: err.failure().to_string(),
                        failed_at: self.clock.utc(),
                    };
                    state.login_attempts = state.login_attempts.saturating_add(1);
                    state.last_failure = Some(err.clone());
                }
                self.events.record(
                    self.event(invocation.id(), LOGIN_OPERATION, EventOutcome::AuthenticationFailed)
                        .with_detail(err.failure().to_string()),
                );
                warn!(
                    host = %self.config.address(),
                    attempts = err.attempts(),
                    error = %err.failure(),
                    "authentication failed"
                );
                Err(self.login_error(err))
            }
        }
    }

    async fn send(
        &self,
        config: &BackoffConfig,
        invocation: &Invocation,
        operation: &str,
        token: &AuthToken,
        request: &RedfishRequest,
    ) -> Result<RedfishResponse, RetryError> {
        let transport = &self.transport;
        self.executor
            .execute_with(config, invocation, operation, move || async move {
                transport.send(token, request).await?.into_result()
            })
            .await
    }

    /// Drops the token if it still belongs to `generation`.
    fn invalidate(&self, generation: u64, invocation: InvocationId, operation: &str) {
        {
            let mut state = self.write_state();
            if state.generation != generation || !state.auth.is_authenticated() {
                return;
            }
            state.auth = AuthState::Unauthenticated;
        }
        self.events
            .record(self.event(invocation, operation, EventOutcome::Invalidated));
        info!(host = %self.config.address(), generation, "session token rejected, re-authenticating");
    }

    fn event(&self, invocation: InvocationId, operation: &str, outcome: EventOutcome) -> AccessEvent {
        AccessEvent::new(invocation, self.config.address().clone(), operation, 0, outcome)
    }

    fn login_error(&self, source: RetryError) -> SessionError {
        SessionError::Login {
            host: self.config.address().clone(),
            source,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
