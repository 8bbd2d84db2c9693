//! Guard configuration and the decision it produces.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GuardConfig
// ---------------------------------------------------------------------------

/// Route names and permission names the guard works with.
///
/// Defaults match the admin console layout: a public welcome page at `/`
/// and a dashboard that most signed-in users can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Where unauthenticated users are sent, and where a forced logout
    /// lands.
    pub root_route: String,

    /// Default fallback for routes that don't name their own.
    pub dashboard_route: String,

    /// Permission that grants access to the dashboard.
    pub dashboard_permission: String,

    /// Permissions that make a user worth keeping signed in even without
    /// dashboard access. A user denied a dashboard-fallback route who holds
    /// none of these is logged out.
    pub basic_permissions: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            root_route: "/".into(),
            dashboard_route: "/dashboard".into(),
            dashboard_permission: "READ_DASHBOARD".into(),
            basic_permissions: vec![
                "READ_USERS".into(),
                "READ_ROLES".into(),
                "READ_PERMISSIONS".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// RouteAccessDecision
// ---------------------------------------------------------------------------

/// What should happen when a protected view is (or stays) mounted.
///
/// Never stored; recomputed from the current session every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccessDecision {
    /// Render the view.
    Allow,
    /// Don't render; navigate to the given route.
    Redirect(String),
    /// Don't render; end the session, then navigate to the root route.
    DenyAndLogout,
}

impl RouteAccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl fmt::Display for RouteAccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Redirect(route) => write!(f, "redirect to {route}"),
            Self::DenyAndLogout => write!(f, "deny and logout"),
        }
    }
}
