//! Core types exchanged with the authentication backend.
//!
//! Every backend call answers with the same envelope:
//!
//! ```json
//! { "success": true, "data": { ... }, "error": null }
//! ```
//!
//! [`ApiResponse`] models that envelope generically; the payload types
//! ([`User`], [`LoginData`], [`RefreshData`]) fill in `data`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Backend identifier of a user.
///
/// Newtype over the raw string so a user id can't be confused with a token
/// or an email in function signatures. `#[serde(transparent)]` keeps the
/// wire shape a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The identity record of the signed-in user.
///
/// Replaced wholesale whenever the backend sends a fresh copy (login and
/// successful verification). Permissions are a set: order carries no
/// meaning and duplicates collapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Named capabilities (`READ_USERS`, `READ_DASHBOARD`, ...).
    /// Missing in the payload means "no permissions".
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl User {
    /// Returns `true` if the user holds `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Login credentials.
///
/// `Debug` is implemented by hand so the password never ends up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Payload of a successful login: who signed in and their token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    pub user: User,
    pub token: String,
}

/// Payload of a successful refresh: the newly minted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshData {
    pub token: String,
}

/// The envelope every backend endpoint answers with.
///
/// `success` is authoritative. `data` and `error` are both optional on the
/// wire; a successful verify may legitimately carry no user, and a failed
/// call may carry no message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A successful response without a payload.
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// A failed response with a diagnostic message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The backend's error message, or `fallback` when it sent none.
    pub fn error_or(&self, fallback: &str) -> String {
        self.error.clone().unwrap_or_else(|| fallback.to_owned())
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Decodes a raw response body with the given codec.
    ///
    /// Backend adapters call this on whatever bytes their HTTP client
    /// returned, so the envelope shape is checked in one place.
    pub fn decode(codec: &impl Codec, body: &[u8]) -> Result<Self, ProtocolError> {
        let response: Self = codec.decode(body)?;
        if !response.success && response.data.is_some() {
            return Err(ProtocolError::InvalidMessage(
                "failed response must not carry data".into(),
            ));
        }
        Ok(response)
    }
}

// =========================================================================
// Tests
// =========================================================================
