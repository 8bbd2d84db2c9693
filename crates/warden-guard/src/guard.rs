//! The route guard: applies access decisions to a live session.

use std::future::Future;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use warden_session::{AuthBackend, SessionManager, SessionSnapshot, TokenStore};

use crate::{decide, GuardConfig, Navigator, ProtectedRoute, RouteAccessDecision};

/// The view of a session the guard needs: read it, watch it, end it.
///
/// Implemented for [`SessionManager`]; tests can substitute a fake.
pub trait GuardedSession: Send + Sync + 'static {
    fn snapshot(&self) -> SessionSnapshot;

    fn subscribe(&self) -> watch::Receiver<SessionSnapshot>;

    fn logout(&self) -> impl Future<Output = ()> + Send;
}

impl<B: AuthBackend, S: TokenStore> GuardedSession for SessionManager<B, S> {
    fn snapshot(&self) -> SessionSnapshot {
        SessionManager::snapshot(self)
    }

    fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        SessionManager::subscribe(self)
    }

    async fn logout(&self) {
        SessionManager::logout(self).await;
    }
}

/// Gates protected views on the current session.
///
/// Every question goes through [`decide`], so whether a view renders and
/// where the user is sent can't drift apart.
pub struct RouteGuard<S, N> {
    session: S,
    navigator: N,
    config: GuardConfig,
}

impl<S: GuardedSession, N: Navigator> RouteGuard<S, N> {
    pub fn new(session: S, navigator: N, config: GuardConfig) -> Self {
        Self {
            session,
            navigator,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// The decision for `route` against the current session. No side
    /// effects.
    pub fn decide(&self, route: &ProtectedRoute) -> RouteAccessDecision {
        self.decide_for(&self.session.snapshot(), route)
    }

    /// Whether the view behind `route` may render right now.
    pub fn should_render(&self, route: &ProtectedRoute) -> bool {
        self.decide(route).is_allowed()
    }

    /// Decides for `route` and applies the outcome once: navigates on a
    /// redirect, logs out and returns to the root route on a denial.
    pub async fn activate(&self, route: &ProtectedRoute) -> RouteAccessDecision {
        let decision = self.decide(route);
        self.apply(&decision).await;
        decision
    }

    /// Keeps `route` mounted for as long as access is allowed.
    ///
    /// Re-decides on every session change. Once the decision is anything
    /// but `Allow`, its effect is applied and the decision returned. A
    /// session that goes away entirely (every manager dropped) resolves
    /// with the last decision.
    pub async fn hold(&self, route: &ProtectedRoute) -> RouteAccessDecision {
        let mut changes = self.session.subscribe();
        loop {
            let decision = {
                let snapshot = changes.borrow_and_update();
                self.decide_for(&snapshot, route)
            };
            if !decision.is_allowed() {
                self.apply(&decision).await;
                return decision;
            }
            if changes.changed().await.is_err() {
                debug!("session closed while route held");
                return decision;
            }
        }
    }

    fn decide_for(&self, snapshot: &SessionSnapshot, route: &ProtectedRoute) -> RouteAccessDecision {
        decide(
            snapshot,
            &route.requirement,
            route.fallback(&self.config),
            &self.config,
        )
    }

    async fn apply(&self, decision: &RouteAccessDecision) {
        match decision {
            RouteAccessDecision::Allow => {}
            RouteAccessDecision::Redirect(target) => {
                debug!(%target, "access denied, redirecting");
                self.navigator.redirect(target);
            }
            RouteAccessDecision::DenyAndLogout => {
                warn!("user holds no basic permissions, ending session");
                self.session.logout().await;
                info!(route = %self.config.root_route, "returning to root after forced logout");
                self.navigator.redirect(&self.config.root_route);
            }
        }
    }
}
