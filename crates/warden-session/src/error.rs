//! Error types for the session layer.

use warden_protocol::ProtocolError;

/// Errors that can occur while managing a session.
///
/// The first four variants are the failure kinds a consumer reacts to;
/// `Storage` and `Protocol` wrap lower-level causes.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend rejected the login credentials. Never retried.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The backend could not be reached, or timed out. Backend adapters
    /// map every transport failure onto this variant.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Verification answered `success: false` for the current token.
    #[error("token rejected: {0}")]
    TokenInvalid(String),

    /// The backend refused to mint a new token. Always ends the session.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The durable token store failed to read, write or delete.
    #[error("token store error: {0}")]
    Storage(#[from] std::io::Error),

    /// The backend answered with a body that breaks the envelope contract.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A logout or another login changed the session while this call was
    /// waiting on the backend, so its result was dropped.
    #[error("superseded by a newer session change")]
    Superseded,
}
