//! # Warden
//!
//! Client-side session and route guard for single-page applications.
//!
//! Warden keeps the signed-in user's token fresh (periodic verification,
//! refresh, forced logout when the backend stops accepting it) and answers
//! the question every protected view asks: may this user be here?
//!
//! The app supplies three things: an [`AuthBackend`](prelude::AuthBackend)
//! over its HTTP client, a [`TokenStore`](prelude::TokenStore) and a
//! [`Navigator`](prelude::Navigator) over its router.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warden::prelude::*;
//!
//! // Implement AuthBackend for your API client, then:
//! // let warden = Warden::builder()
//! //     .config(WardenConfig::from_json_str(&settings)?)
//! //     .build(api, FileTokenStore::new("session/token"), router)
//! //     .await?;
//! // if warden.activate(&ProtectedRoute::requiring("READ_USERS")).await.is_allowed() {
//! //     render_users_page();
//! // }
//! ```

mod config;
mod error;
mod runtime;

pub use config::WardenConfig;
pub use error::WardenError;
pub use runtime::{Warden, WardenBuilder};

pub use warden_guard as guard;
pub use warden_protocol as protocol;
pub use warden_session as session;
pub use warden_tick as tick;

pub mod prelude {
    pub use crate::{Warden, WardenBuilder, WardenConfig, WardenError};
    pub use warden_guard::{
        GuardConfig, Navigator, PermissionRequirement, ProtectedRoute, RecordingNavigator,
        RouteAccessDecision, RouteGuard,
    };
    pub use warden_protocol::{ApiResponse, Credentials, LoginData, RefreshData, User, UserId};
    pub use warden_session::{
        AuthBackend, AuthError, Clock, Escalation, FileTokenStore, MemoryTokenStore,
        SessionConfig, SessionEnd, SessionManager, SessionSnapshot, SessionState, SystemClock,
        TokenStatus, TokenStore, TokenValidity, VerifyOutcome,
    };
}
