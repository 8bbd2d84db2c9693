//! Session types: what the session manager owns and what it publishes.
//!
//! A session is the signed-in user plus their token. Consumers never touch
//! it directly; they read [`SessionSnapshot`]s, which tell them:
//! - WHERE the session is in its lifecycle ([`SessionState`])
//! - WHO is signed in (`User`)
//! - HOW fresh the token is ([`TokenValidity`])
//! - WHY the previous session ended, if it did ([`SessionEnd`])

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use warden_protocol::User;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often (in milliseconds) the token is re-verified while a
    /// session exists. Verification starts automatically after login and
    /// restore.
    ///
    /// Default: 5 minutes. Set to 0 to disable automatic verification.
    pub verify_interval_ms: u64,

    /// Upper bound of the random delay added to the first periodic check.
    ///
    /// Default: 0 (no jitter).
    pub verify_jitter_ms: u64,

    /// What the start-up check does when the stored token turns out to be
    /// invalid. Default: [`Escalation::Logout`].
    pub startup_policy: Escalation,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            verify_interval_ms: 5 * 60 * 1000,
            verify_jitter_ms: 0,
            startup_policy: Escalation::Logout,
        }
    }
}

impl SessionConfig {
    /// The periodic verification interval, `None` when disabled.
    pub fn verify_interval(&self) -> Option<Duration> {
        (self.verify_interval_ms > 0).then(|| Duration::from_millis(self.verify_interval_ms))
    }

    pub fn verify_jitter(&self) -> Duration {
        Duration::from_millis(self.verify_jitter_ms)
    }
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

/// What a verification does when the token turns out to be invalid.
///
/// Manual checks report; the periodic check logs out. Passing the policy
/// explicitly keeps that difference visible at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// Record the failure in [`TokenValidity`]; keep the session.
    #[default]
    Report,
    /// Record the failure, then end the session.
    Logout,
}

// ---------------------------------------------------------------------------
// TokenValidity
// ---------------------------------------------------------------------------

/// Outcome of the most recent verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// No verification has completed for the current session yet.
    #[default]
    Unknown,
    Valid,
    Invalid,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Transient verification state. Never persisted; reset with every new
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenValidity {
    pub status: TokenStatus,
    /// When the last verification completed.
    pub last_checked_at: Option<SystemTime>,
    /// Diagnostic from the last failed verification.
    pub error: Option<String>,
}

impl TokenValidity {
    pub(crate) fn valid(at: SystemTime) -> Self {
        Self {
            status: TokenStatus::Valid,
            last_checked_at: Some(at),
            error: None,
        }
    }

    pub(crate) fn invalid(at: SystemTime, error: String) -> Self {
        Self {
            status: TokenStatus::Invalid,
            last_checked_at: Some(at),
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///   NoSession ──(login/restore)──→ Authenticating ──(ok)──→ Authenticated(Unknown|Valid)
///       ↑                               │                         │
///       │                          (failure)                 (verify fails)
///       │                               ↓                         ↓
///       ├───────────────────────── NoSession          Authenticated(Invalid)
///       │                                                         │
///       └──(logout, periodic escalation, refresh failure)─────────┘
/// ```
///
/// A bare [`verify`](crate::SessionManager::verify) can move the session
/// to `Authenticated(Invalid)` but never out of it; only escalation,
/// refresh failure or an explicit logout return to `NoSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session. Initial and terminal state.
    NoSession,
    /// Credentials or a stored token are being checked with the backend.
    Authenticating,
    /// Signed in; the token's last known status is attached.
    Authenticated(TokenStatus),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "NoSession"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Authenticated(status) => write!(f, "Authenticated({status})"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionEnd
// ---------------------------------------------------------------------------

/// Why the most recent session ended. Lets a UI tell "you signed out"
/// apart from "your session expired".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// `logout()` was called.
    Logout,
    /// Periodic (or start-up) verification found the token invalid.
    Escalation(String),
    /// The backend refused to refresh the token.
    RefreshFailed(String),
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Immutable view of the session, published on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<User>,
    pub validity: TokenValidity,
    /// Set when a session ends; cleared when the next one starts.
    pub ended: Option<SessionEnd>,
}

impl SessionSnapshot {
    pub(crate) fn empty() -> Self {
        Self {
            state: SessionState::NoSession,
            user: None,
            validity: TokenValidity::default(),
            ended: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Returns `true` if there is a signed-in user holding `permission`.
    /// Always `false` without a session.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_authenticated()
            && self
                .user
                .as_ref()
                .is_some_and(|user| user.has_permission(permission))
    }
}

// ---------------------------------------------------------------------------
// VerifyOutcome
// ---------------------------------------------------------------------------

/// Result of a verification that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The backend accepted the token.
    Valid {
        /// `true` if the backend sent a fresh user record.
        user_refreshed: bool,
    },
    /// There was no session to verify.
    NoSession,
    /// The session or token changed while the call was in flight; the
    /// answer was about a token that is no longer current and was dropped.
    Superseded,
}
