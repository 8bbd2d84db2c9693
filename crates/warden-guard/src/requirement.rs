//! What a protected view asks of the signed-in user.

use serde::{Deserialize, Serialize};

use crate::GuardConfig;

/// Permissions that unlock a view. Holding any one of them is enough.
///
/// A requirement is an optional primary permission plus a list of
/// alternatives. The effective list is the primary followed by the
/// alternatives; an empty effective list means every signed-in user may
/// enter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionRequirement {
    pub primary: Option<String>,
    pub any_of: Vec<String>,
}

impl PermissionRequirement {
    /// No permission needed, only a session.
    pub fn none() -> Self {
        Self::default()
    }

    /// Requires `permission`.
    pub fn permission(permission: impl Into<String>) -> Self {
        Self {
            primary: Some(permission.into()),
            any_of: Vec::new(),
        }
    }

    /// Requires any one of `permissions`.
    pub fn any_of<I, P>(permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            primary: None,
            any_of: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds `permission` as a further alternative.
    pub fn or(mut self, permission: impl Into<String>) -> Self {
        self.any_of.push(permission.into());
        self
    }

    /// The primary permission followed by the alternatives.
    pub fn effective(&self) -> Vec<&str> {
        self.primary
            .iter()
            .chain(&self.any_of)
            .map(String::as_str)
            .collect()
    }

    pub fn is_unconditional(&self) -> bool {
        self.primary.is_none() && self.any_of.is_empty()
    }
}

/// A view behind the guard: its requirement and where to send users who
/// don't meet it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedRoute {
    pub requirement: PermissionRequirement,
    /// `None` falls back to the configured dashboard route.
    pub fallback_route: Option<String>,
}

impl ProtectedRoute {
    pub fn new(requirement: PermissionRequirement) -> Self {
        Self {
            requirement,
            fallback_route: None,
        }
    }

    /// A route requiring a single permission.
    pub fn requiring(permission: impl Into<String>) -> Self {
        Self::new(PermissionRequirement::permission(permission))
    }

    pub fn with_fallback(mut self, route: impl Into<String>) -> Self {
        self.fallback_route = Some(route.into());
        self
    }

    /// Where a denied user goes.
    pub fn fallback<'a>(&'a self, config: &'a GuardConfig) -> &'a str {
        self.fallback_route
            .as_deref()
            .unwrap_or(&config.dashboard_route)
    }
}
