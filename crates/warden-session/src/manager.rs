//! The session manager: sole owner of the session and its token.
//!
//! Responsibilities:
//! - Logging in and out
//! - Restoring the session from the durable store at start-up
//! - Verifying the token on demand and periodically
//! - Refreshing the token, ending the session when that fails
//! - Publishing a [`SessionSnapshot`] after every change
//!
//! # Concurrency note
//!
//! Backend calls suspend, and on a multi-threaded runtime two tasks can be
//! inside the manager at once (a periodic check racing a manual refresh,
//! say). Three rules keep that safe:
//!
//! 1. In-memory state lives behind a `std::sync::Mutex` that is never held
//!    across an `.await`.
//! 2. Every session or token change bumps a [`Generation`]. An async
//!    result is applied only if the generation it started with is still
//!    current; otherwise it is dropped as [`VerifyOutcome::Superseded`].
//! 3. Store writes and the state change that goes with them happen under
//!    one async write lock, so a refresh racing a logout can't leave a
//!    stale token on disk.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tracing::{debug, info, trace, warn};
use warden_protocol::{ApiResponse, Credentials, LoginData, ProtocolError, User};
use warden_tick::{TickConfig, TickScheduler};

use crate::{
    AuthBackend, AuthError, Clock, Escalation, SessionConfig, SessionEnd,
    SessionSnapshot, SessionState, SystemClock, TokenStore, TokenValidity,
    VerifyOutcome,
};

/// Identifies the current session and the current token within it.
///
/// `session` changes on login, restore and logout; `token` additionally
/// changes on refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Generation {
    session: u64,
    token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NoSession,
    Authenticating,
    Authenticated,
}

/// Where a login started from.
#[derive(Debug, Clone, Copy)]
struct LoginAttempt {
    session: u64,
    /// Whether this login moved the session into `Authenticating`.
    entered: bool,
}

/// Stops the periodic verification task when dropped.
struct PeriodicHandle {
    _stop: oneshot::Sender<()>,
}

struct Inner {
    phase: Phase,
    user: Option<User>,
    token: Option<String>,
    validity: TokenValidity,
    ended: Option<SessionEnd>,
    generation: Generation,
    periodic: Option<PeriodicHandle>,
}

impl Inner {
    fn new() -> Self {
        Self {
            phase: Phase::NoSession,
            user: None,
            token: None,
            validity: TokenValidity::default(),
            ended: None,
            generation: Generation::default(),
            periodic: None,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = match self.phase {
            Phase::NoSession => SessionState::NoSession,
            Phase::Authenticating => SessionState::Authenticating,
            Phase::Authenticated => SessionState::Authenticated(self.validity.status),
        };
        SessionSnapshot {
            state,
            user: self.user.clone(),
            validity: self.validity.clone(),
            ended: self.ended.clone(),
        }
    }

    fn current_token(&self) -> Option<(Generation, String)> {
        if self.phase == Phase::NoSession {
            return None;
        }
        self.token.clone().map(|token| (self.generation, token))
    }

    /// Starts a new session around `token`. The caller sets the phase.
    fn begin(&mut self, token: String, user: Option<User>) {
        self.generation.session += 1;
        self.generation.token += 1;
        self.token = Some(token);
        self.user = user;
        self.validity = TokenValidity::default();
        self.ended = None;
    }

    /// Clears everything that belongs to the session. Returns the token
    /// and the periodic handle so the caller can dispose of them outside
    /// the lock.
    fn end(&mut self, reason: SessionEnd) -> (Option<String>, Option<PeriodicHandle>) {
        self.generation.session += 1;
        self.generation.token += 1;
        self.phase = Phase::NoSession;
        self.user = None;
        self.validity = TokenValidity::default();
        self.ended = Some(reason);
        (self.token.take(), self.periodic.take())
    }
}

struct Shared<B, S> {
    backend: B,
    store: S,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    inner: Mutex<Inner>,
    /// Serialises store writes with the state change that accompanies them.
    write_lock: AsyncMutex<()>,
    changes: watch::Sender<SessionSnapshot>,
}

/// Owns the session, its token and the token's freshness.
///
/// Cheap to clone: clones share one session. Hand a clone to every
/// component that needs to read the session or end it.
///
/// ## Lifecycle
///
/// ```text
/// restore()/login() ──→ Authenticating ──→ Authenticated ──→ logout()
///                                            │    ↑                │
///                                   verify() │    │ refresh_token()│
///                                            ↓    │                ↓
///                                      (validity updated)      NoSession
/// ```
pub struct SessionManager<B, S> {
    shared: Arc<Shared<B, S>>,
}

impl<B, S> Clone for SessionManager<B, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: AuthBackend, S: TokenStore> SessionManager<B, S> {
    /// Creates a manager with no session, using the system clock.
    ///
    /// Call [`restore`](Self::restore) next to pick up a token left by a
    /// previous run.
    pub fn new(backend: B, store: S, config: SessionConfig) -> Self {
        Self::with_clock(backend, store, config, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), with an injected clock for timestamps.
    pub fn with_clock(
        backend: B,
        store: S,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (changes, _) = watch::channel(SessionSnapshot::empty());
        Self {
            shared: Arc::new(Shared {
                backend,
                store,
                clock,
                config,
                inner: Mutex::new(Inner::new()),
                write_lock: AsyncMutex::new(()),
                changes,
            }),
        }
    }

    // =====================================================================
    // Read side
    // =====================================================================

    /// The current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner().snapshot()
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.changes.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner().phase == Phase::Authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.inner().user.clone()
    }

    pub fn validity(&self) -> TokenValidity {
        self.inner().validity.clone()
    }

    /// Returns `true` if the signed-in user holds `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.snapshot().has_permission(permission)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn is_periodic_verification_active(&self) -> bool {
        self.inner().periodic.is_some()
    }

    // =====================================================================
    // Session lifecycle
    // =====================================================================

    /// Seeds the session from the durable store. Call once at start-up.
    ///
    /// With a stored token the session passes through `Authenticating`
    /// while the token is verified under `config.startup_policy`.
    ///
    /// # Errors
    /// - [`AuthError::Storage`] if the store can't be read
    /// - whatever the start-up verification returned
    pub async fn restore(&self) -> Result<VerifyOutcome, AuthError> {
        let (generation, token) = {
            let _write = self.shared.write_lock.lock().await;
            let Some(token) = self.shared.store.load().await? else {
                debug!("no stored token, starting without a session");
                return Ok(VerifyOutcome::NoSession);
            };
            match self.begin_restore(token.clone()) {
                Some(generation) => (generation, token),
                None => {
                    debug!("session already present, skipping restore");
                    return Ok(VerifyOutcome::Superseded);
                }
            }
        };

        info!("restoring session from stored token");
        let outcome = self
            .verify_at(generation, token, self.shared.config.startup_policy)
            .await;
        if self.inner().phase != Phase::NoSession {
            self.start_auto_verification();
        }
        outcome
    }

    /// Signs in with `credentials`.
    ///
    /// On success the token is stored durably, the user replaced and
    /// periodic verification started (unless disabled). On failure the
    /// observable state is left as it was.
    ///
    /// A login that is overtaken by another session change (a logout, or
    /// another login finishing first) is dropped: nothing is stored and the
    /// minted token is handed back to the backend.
    ///
    /// # Errors
    /// - [`AuthError::InvalidCredentials`] - the backend said no
    /// - [`AuthError::NetworkFailure`] - the backend was unreachable
    /// - [`AuthError::Protocol`] - success without user and token
    /// - [`AuthError::Storage`] - the token couldn't be stored
    /// - [`AuthError::Superseded`] - the session changed while logging in
    pub async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<SessionSnapshot, AuthError> {
        let attempt = self.begin_login();
        debug!(email = %credentials.email, "logging in");

        let data = match self.request_login(credentials).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "login failed");
                self.abandon_login(attempt);
                return Err(e);
            }
        };

        let discarded = {
            let _write = self.shared.write_lock.lock().await;
            if self.generation().session == attempt.session {
                if let Err(e) = self.shared.store.save(&data.token).await {
                    warn!(error = %e, "could not store token, login abandoned");
                    self.abandon_login(attempt);
                    return Err(e);
                }
                self.install_session(data);
                None
            } else {
                Some(data.token)
            }
        };

        if let Some(token) = discarded {
            info!("session changed while logging in, discarding the new token");
            if let Err(e) = self.shared.backend.logout(&token).await {
                debug!(error = %e, "backend logout notification failed");
            }
            return Err(AuthError::Superseded);
        }

        self.start_auto_verification();
        Ok(self.snapshot())
    }

    /// Ends the session: clears the user, deletes the stored token and
    /// stops periodic verification, then tells the backend.
    ///
    /// Idempotent; without a session this does nothing.
    pub async fn logout(&self) {
        if !self.end_session(None, SessionEnd::Logout).await {
            debug!("logout without a session, nothing to do");
        }
    }

    /// Verifies the current token and reports the result without ending
    /// the session. Same as `verify_with(Escalation::Report)`.
    pub async fn verify(&self) -> Result<VerifyOutcome, AuthError> {
        self.verify_with(Escalation::Report).await
    }

    /// Verifies the current token under an explicit escalation policy.
    ///
    /// With [`Escalation::Report`] the result lands in [`TokenValidity`].
    /// With [`Escalation::Logout`] a failure ends the session instead.
    ///
    /// # Errors
    /// - [`AuthError::TokenInvalid`] - the backend rejected the token
    /// - [`AuthError::NetworkFailure`] - the backend was unreachable
    pub async fn verify_with(
        &self,
        policy: Escalation,
    ) -> Result<VerifyOutcome, AuthError> {
        let Some((generation, token)) = self.current_token() else {
            return Ok(VerifyOutcome::NoSession);
        };
        self.verify_at(generation, token, policy).await
    }

    /// Swaps the current token for a fresh one.
    ///
    /// Returns `Ok(true)` once the new token is stored and re-verified.
    /// Any backend failure ends the session and returns `Ok(false)`; a
    /// refresh the backend refuses means the credential is gone
    /// server-side. Without a session, returns `Ok(false)`.
    ///
    /// If the token was replaced while this call waited on the backend (a
    /// concurrent refresh or login), its answer is dropped and the result
    /// says whether a session is still signed in: `false` only ever means
    /// there is no session now.
    ///
    /// # Errors
    /// [`AuthError::Storage`] if the new token couldn't be stored. The
    /// session is ended first.
    pub async fn refresh_token(&self) -> Result<bool, AuthError> {
        let Some((generation, token)) = self.current_token() else {
            debug!("refresh requested without a session");
            return Ok(false);
        };

        let new_token = match self.shared.backend.refresh(&token).await {
            Ok(ApiResponse {
                success: true,
                data: Some(data),
                ..
            }) => data.token,
            Ok(rejected) => {
                let failure = AuthError::RefreshFailed(rejected.error_or("refresh rejected"));
                return Ok(self.fail_refresh(generation, failure).await);
            }
            Err(e) => {
                let failure = AuthError::RefreshFailed(e.to_string());
                return Ok(self.fail_refresh(generation, failure).await);
            }
        };

        let installed = {
            let _write = self.shared.write_lock.lock().await;
            if self.generation() != generation {
                None
            } else {
                Some(
                    self.shared
                        .store
                        .save(&new_token)
                        .await
                        .map(|()| self.install_token(new_token.clone())),
                )
            }
        };

        let new_generation = match installed {
            None => {
                debug!("token replaced during refresh, discarding new token");
                return Ok(self.is_authenticated());
            }
            Some(Err(e)) => {
                warn!(error = %e, "could not store refreshed token, ending session");
                self.end_session(Some(generation), SessionEnd::RefreshFailed(e.to_string()))
                    .await;
                return Err(e);
            }
            Some(Ok(new_generation)) => new_generation,
        };

        info!("token refreshed");
        if let Err(e) = self
            .verify_at(new_generation, new_token, Escalation::Report)
            .await
        {
            debug!(error = %e, "verification after refresh failed");
        }
        Ok(true)
    }

    // =====================================================================
    // Periodic verification
    // =====================================================================

    /// Starts re-verifying the token every `interval`, logging out the
    /// first time a check fails.
    ///
    /// Only runs while a session exists. The task is bound to the session
    /// it was started for and stops on its own when that session ends.
    /// Replaces any task already running. Returns `false` (and starts
    /// nothing) without a session or with a zero interval.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_periodic_verification(&self, interval: Duration) -> bool {
        if interval.is_zero() {
            return false;
        }
        let mut inner = self.inner();
        if inner.phase == Phase::NoSession {
            debug!("no session, periodic verification not started");
            return false;
        }

        let session = inner.generation.session;
        let (stop_tx, stop_rx) = oneshot::channel();
        let scheduler = TickScheduler::new(TickConfig {
            initial_jitter: self.shared.config.verify_jitter(),
            ..TickConfig::every(interval)
        });
        tokio::spawn(run_periodic(
            Arc::downgrade(&self.shared),
            session,
            scheduler,
            stop_rx,
        ));

        // Replacing the handle drops the previous one, which stops its task.
        inner.periodic = Some(PeriodicHandle { _stop: stop_tx });
        info!(
            interval_ms = interval.as_millis() as u64,
            "periodic verification started"
        );
        true
    }

    /// Stops periodic verification. Returns `false` if none was running.
    pub fn stop_periodic_verification(&self) -> bool {
        let stopped = self.inner().periodic.take().is_some();
        if stopped {
            info!("periodic verification stopped");
        }
        stopped
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.shared.changes.send_replace(inner.snapshot());
    }

    fn generation(&self) -> Generation {
        self.inner().generation
    }

    fn current_token(&self) -> Option<(Generation, String)> {
        self.inner().current_token()
    }

    /// The current token, but only if it still belongs to `session`.
    fn current_token_for(&self, session: u64) -> Option<(Generation, String)> {
        let inner = self.inner();
        if inner.generation.session != session {
            return None;
        }
        inner.current_token()
    }

    fn start_auto_verification(&self) {
        if let Some(interval) = self.shared.config.verify_interval() {
            self.start_periodic_verification(interval);
        }
    }

    fn begin_restore(&self, token: String) -> Option<Generation> {
        let mut inner = self.inner();
        if inner.phase != Phase::NoSession {
            return None;
        }
        inner.begin(token, None);
        inner.phase = Phase::Authenticating;
        self.publish(&inner);
        Some(inner.generation)
    }

    /// Enters `Authenticating` when there is no session yet, and records
    /// the session the login started from.
    fn begin_login(&self) -> LoginAttempt {
        let mut inner = self.inner();
        let entered = inner.phase == Phase::NoSession;
        if entered {
            inner.phase = Phase::Authenticating;
            self.publish(&inner);
        }
        LoginAttempt {
            session: inner.generation.session,
            entered,
        }
    }

    fn abandon_login(&self, attempt: LoginAttempt) {
        if !attempt.entered {
            return;
        }
        let mut inner = self.inner();
        if inner.phase == Phase::Authenticating && inner.generation.session == attempt.session {
            inner.phase = Phase::NoSession;
            self.publish(&inner);
        }
    }

    async fn request_login(&self, credentials: &Credentials) -> Result<LoginData, AuthError> {
        let response = self.shared.backend.login(credentials).await?;
        if !response.success {
            return Err(AuthError::InvalidCredentials(
                response.error_or("login rejected"),
            ));
        }
        response.data.ok_or_else(|| {
            ProtocolError::InvalidMessage("login succeeded without user and token".into())
                .into()
        })
    }

    fn install_session(&self, data: LoginData) {
        let LoginData { user, token } = data;
        let user_id = user.id.clone();
        let previous = {
            let mut inner = self.inner();
            inner.begin(token, Some(user));
            inner.phase = Phase::Authenticated;
            let previous = inner.periodic.take();
            self.publish(&inner);
            previous
        };
        drop(previous);
        info!(%user_id, "logged in");
    }

    fn install_token(&self, token: String) -> Generation {
        let mut inner = self.inner();
        inner.token = Some(token);
        inner.generation.token += 1;
        self.publish(&inner);
        inner.generation
    }

    /// Asks the backend about `token` and applies the answer if
    /// `generation` is still current.
    async fn verify_at(
        &self,
        generation: Generation,
        token: String,
        policy: Escalation,
    ) -> Result<VerifyOutcome, AuthError> {
        let response = self.shared.backend.verify(&token).await;
        let checked_at = self.shared.clock.now();

        let failure = {
            let mut inner = self.inner();
            if inner.generation != generation {
                debug!("verification answer is for a replaced token, dropping it");
                return Ok(VerifyOutcome::Superseded);
            }

            let failure = match response {
                Ok(ApiResponse {
                    success: true,
                    data,
                    ..
                }) => {
                    let user_refreshed = data.is_some();
                    if let Some(user) = data {
                        inner.user = Some(user);
                    }
                    inner.phase = Phase::Authenticated;
                    inner.validity = TokenValidity::valid(checked_at);
                    self.publish(&inner);
                    trace!(user_refreshed, "token verified");
                    return Ok(VerifyOutcome::Valid { user_refreshed });
                }
                Ok(rejected) => AuthError::TokenInvalid(rejected.error_or("token rejected")),
                Err(e) => e,
            };

            // Under `Logout` the session is about to end, so an
            // authenticated-but-invalid state is never published.
            if policy == Escalation::Report {
                inner.phase = Phase::Authenticated;
                inner.validity = TokenValidity::invalid(checked_at, failure.to_string());
                self.publish(&inner);
            }
            failure
        };

        warn!(error = %failure, ?policy, "token verification failed");
        if policy == Escalation::Logout {
            self.end_session(
                Some(generation),
                SessionEnd::Escalation(failure.to_string()),
            )
            .await;
        }
        Err(failure)
    }

    /// Ends the session a failed refresh belonged to. If a newer token has
    /// taken its place meanwhile, the failure is stale and the session
    /// stays. Returns whether a session remains.
    async fn fail_refresh(&self, generation: Generation, failure: AuthError) -> bool {
        if self
            .end_session(Some(generation), SessionEnd::RefreshFailed(failure.to_string()))
            .await
        {
            warn!(error = %failure, "refresh failed, session ended");
            return false;
        }
        debug!(error = %failure, "refresh failed for a replaced token, ignoring");
        self.is_authenticated()
    }

    /// Ends the session if there is one and, when `expected` is given, it
    /// is still that generation. Returns whether a session was ended.
    async fn end_session(&self, expected: Option<Generation>, reason: SessionEnd) -> bool {
        let token = {
            let _write = self.shared.write_lock.lock().await;
            let Some((token, periodic)) = self.clear_state(expected, reason) else {
                return false;
            };
            drop(periodic);
            if let Err(e) = self.shared.store.clear().await {
                warn!(error = %e, "could not delete stored token");
            }
            token
        };

        if let Some(token) = token {
            if let Err(e) = self.shared.backend.logout(&token).await {
                debug!(error = %e, "backend logout notification failed");
            }
        }
        true
    }

    fn clear_state(
        &self,
        expected: Option<Generation>,
        reason: SessionEnd,
    ) -> Option<(Option<String>, Option<PeriodicHandle>)> {
        let mut inner = self.inner();
        if inner.phase == Phase::NoSession {
            return None;
        }
        if expected.is_some_and(|g| g != inner.generation) {
            debug!("session already replaced, not ending it");
            return None;
        }
        info!(?reason, "session ended");
        let ended = inner.end(reason);
        self.publish(&inner);
        Some(ended)
    }
}

/// Body of the periodic verification task.
///
/// Holds only a weak reference: once every `SessionManager` clone is
/// dropped the task exits at its next tick.
async fn run_periodic<B: AuthBackend, S: TokenStore>(
    shared: Weak<Shared<B, S>>,
    session: u64,
    mut scheduler: TickScheduler,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            tick = scheduler.wait_for_tick() => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let manager = SessionManager { shared };
                let Some((generation, token)) = manager.current_token_for(session) else {
                    break;
                };
                trace!(tick = tick.tick, "periodic verification");
                if let Err(e) = manager
                    .verify_at(generation, token, Escalation::Logout)
                    .await
                {
                    debug!(error = %e, "periodic verification failed");
                }
                scheduler.record_tick_end();
            }
        }
    }
    debug!(session, "periodic verification task exited");
}
