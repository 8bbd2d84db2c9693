//! Unified error type for Warden.

use warden_protocol::ProtocolError;
use warden_session::AuthError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `warden` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// A session-level error (login, verify, refresh, storage).
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A configuration file couldn't be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration couldn't be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
