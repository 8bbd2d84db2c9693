//! Permission-gated route access for Warden.
//!
//! Every protected view asks the guard one question: given the current
//! session, may this user be here, and if not, where should they go?
//!
//! # Key types
//!
//! - [`PermissionRequirement`] / [`ProtectedRoute`] - what a view needs
//! - [`decide`] - the pure routine behind every answer
//! - [`RouteGuard`] - applies decisions to a live session via a [`Navigator`]
//! - [`GuardConfig`] - route and permission names

#![allow(async_fn_in_trait)]

mod config;
mod decision;
mod guard;
mod navigator;
mod requirement;

pub use config::{GuardConfig, RouteAccessDecision};
pub use decision::{decide, PermissionSource};
pub use guard::{GuardedSession, RouteGuard};
pub use navigator::{Navigator, RecordingNavigator};
pub use requirement::{PermissionRequirement, ProtectedRoute};
