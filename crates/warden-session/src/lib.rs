//! Session and token lifecycle management for Warden.
//!
//! This crate owns everything about "who is signed in":
//!
//! 1. **Backend access** - the [`AuthBackend`] trait the app implements
//!    over its HTTP client
//! 2. **Durable token** - [`TokenStore`], with memory and file
//!    implementations
//! 3. **The session itself** - [`SessionManager`]: login, logout, restore,
//!    verification (manual and periodic) and refresh
//!
//! # How it fits in the stack
//!
//! ```text
//! Guard Layer (above)  ← reads snapshots, decides route access
//!     ↕
//! Session Layer (this crate)  ← owns the user, the token and its freshness
//!     ↕
//! Protocol Layer (below)  ← provides User, ApiResponse, Credentials
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod clock;
mod error;
mod manager;
mod session;
mod store;

pub use auth::AuthBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use manager::SessionManager;
pub use session::{
    Escalation, SessionConfig, SessionEnd, SessionSnapshot, SessionState, TokenStatus,
    TokenValidity, VerifyOutcome,
};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
