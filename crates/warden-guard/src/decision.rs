//! The access decision shared by the render gate and the navigation effect.
//!
//! Both questions ("may this view render?" and "where should the user go?")
//! are answered by one pure function, so they can never disagree.

use warden_session::SessionSnapshot;

use crate::{GuardConfig, PermissionRequirement, RouteAccessDecision};

/// Anything that can answer "is someone signed in, and may they do X?".
pub trait PermissionSource {
    fn is_authenticated(&self) -> bool;
    fn has_permission(&self, permission: &str) -> bool;
}

impl PermissionSource for SessionSnapshot {
    fn is_authenticated(&self) -> bool {
        SessionSnapshot::is_authenticated(self)
    }

    fn has_permission(&self, permission: &str) -> bool {
        SessionSnapshot::has_permission(self, permission)
    }
}

/// Decides whether `source` may enter a view guarded by `requirement`.
///
/// 1. Not signed in: redirect to the root route.
/// 2. No permission required: allow.
/// 3. Any required permission held: allow.
/// 4. Denied with the dashboard as fallback, and the user can't see the
///    dashboard either: if they hold none of the basic permissions there is
///    nowhere left to send them, so deny and log out.
/// 5. Otherwise redirect to `fallback`.
pub fn decide(
    source: &impl PermissionSource,
    requirement: &PermissionRequirement,
    fallback: &str,
    config: &GuardConfig,
) -> RouteAccessDecision {
    if !source.is_authenticated() {
        return RouteAccessDecision::Redirect(config.root_route.clone());
    }

    if requirement.is_unconditional()
        || requirement
            .effective()
            .iter()
            .any(|p| source.has_permission(p))
    {
        return RouteAccessDecision::Allow;
    }

    if fallback == config.dashboard_route
        && !source.has_permission(&config.dashboard_permission)
        && !config
            .basic_permissions
            .iter()
            .any(|p| source.has_permission(p))
    {
        return RouteAccessDecision::DenyAndLogout;
    }

    RouteAccessDecision::Redirect(fallback.to_owned())
}
