//! `Warden` builder and runtime.
//!
//! This is the entry point for hosting Warden in an application. It ties
//! together all the layers: backend → session → guard → navigator.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use warden_guard::{
    GuardConfig, Navigator, ProtectedRoute, RouteAccessDecision, RouteGuard,
};
use warden_protocol::{Credentials, User};
use warden_session::{
    AuthBackend, AuthError, Clock, Escalation, SessionConfig, SessionManager, SessionSnapshot,
    SystemClock, TokenStore, TokenValidity, VerifyOutcome,
};

use crate::{WardenConfig, WardenError};

/// Builder for configuring and starting Warden.
///
/// # Example
///
/// ```rust,ignore
/// use warden::prelude::*;
///
/// let warden = Warden::builder()
///     .session_config(SessionConfig::default())
///     .build(my_backend, FileTokenStore::new("token"), my_router)
///     .await?;
/// ```
pub struct WardenBuilder {
    session_config: SessionConfig,
    guard_config: GuardConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl WardenBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            guard_config: GuardConfig::default(),
            clock: None,
        }
    }

    /// Sets both configurations at once.
    pub fn config(mut self, config: WardenConfig) -> Self {
        self.session_config = config.session;
        self.guard_config = config.guard;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn guard_config(mut self, config: GuardConfig) -> Self {
        self.guard_config = config;
        self
    }

    /// Sets the clock used for verification timestamps. Defaults to the
    /// system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the session manager, restores any stored session and wires
    /// the route guard to it.
    ///
    /// A stored token the backend rejects (or can't check) is not a build
    /// failure: the session simply starts out ended or invalid, as the
    /// start-up policy dictates.
    ///
    /// # Errors
    /// [`WardenError::Auth`] if the token store can't be read.
    pub async fn build<B, S, N>(
        self,
        backend: B,
        store: S,
        navigator: N,
    ) -> Result<Warden<B, S, N>, WardenError>
    where
        B: AuthBackend,
        S: TokenStore,
        N: Navigator,
    {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let session = SessionManager::with_clock(backend, store, self.session_config, clock);

        match session.restore().await {
            Ok(outcome) => info!(?outcome, "warden started"),
            Err(e @ AuthError::Storage(_)) => return Err(e.into()),
            Err(e) => warn!(error = %e, state = %session.state(), "stored session not usable"),
        }

        let guard = RouteGuard::new(session.clone(), navigator, self.guard_config);
        Ok(Warden { session, guard })
    }
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Warden instance: one session and the guard watching it.
///
/// Everything a host application needs goes through here. The underlying
/// [`SessionManager`] and [`RouteGuard`] are reachable for anything more
/// specialised.
pub struct Warden<B, S, N> {
    session: SessionManager<B, S>,
    guard: RouteGuard<SessionManager<B, S>, N>,
}

impl Warden<(), (), ()> {
    /// Creates a new builder. The backend, store and navigator types are
    /// fixed by [`WardenBuilder::build`].
    pub fn builder() -> WardenBuilder {
        WardenBuilder::new()
    }
}

impl<B, S, N> Warden<B, S, N>
where
    B: AuthBackend,
    S: TokenStore,
    N: Navigator,
{
    pub fn session(&self) -> &SessionManager<B, S> {
        &self.session
    }

    pub fn guard(&self) -> &RouteGuard<SessionManager<B, S>, N> {
        &self.guard
    }

    // -- Session ------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.session.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.session.user()
    }

    pub fn validity(&self) -> TokenValidity {
        self.session.validity()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.session.has_permission(permission)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<SessionSnapshot, WardenError> {
        Ok(self.session.login(credentials).await?)
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// Verifies the token and reports; never logs out on its own.
    pub async fn verify(&self) -> Result<VerifyOutcome, WardenError> {
        Ok(self.session.verify().await?)
    }

    pub async fn verify_with(&self, policy: Escalation) -> Result<VerifyOutcome, WardenError> {
        Ok(self.session.verify_with(policy).await?)
    }

    pub async fn refresh_token(&self) -> Result<bool, WardenError> {
        Ok(self.session.refresh_token().await?)
    }

    // -- Routes ---------------------------------------------------------------

    pub fn decide(&self, route: &ProtectedRoute) -> RouteAccessDecision {
        self.guard.decide(route)
    }

    pub fn should_render(&self, route: &ProtectedRoute) -> bool {
        self.guard.should_render(route)
    }

    pub async fn activate(&self, route: &ProtectedRoute) -> RouteAccessDecision {
        self.guard.activate(route).await
    }

    pub async fn hold(&self, route: &ProtectedRoute) -> RouteAccessDecision {
        self.guard.hold(route).await
    }
}
