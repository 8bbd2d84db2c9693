//! Error types for the protocol layer.

/// Errors raised while turning backend bodies into typed responses.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed body, missing required fields,
    /// or a proxy answering with something that isn't JSON at all.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body parsed but breaks the envelope contract, e.g. a
    /// successful login that carries no token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
