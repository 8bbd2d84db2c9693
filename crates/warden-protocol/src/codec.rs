//! Codec trait and implementations for backend response bodies.
//!
//! The session layer never sees raw bytes: a backend adapter receives a
//! body from its HTTP client and turns it into an [`ApiResponse`](crate::ApiResponse)
//! through a [`Codec`]. Keeping the format behind a trait means an adapter
//! for a non-JSON backend only has to supply another implementation.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because backend adapters are shared across
/// the session manager's tasks for as long as the session layer lives.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// truncated, or don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use warden_protocol::{ApiResponse, Codec, JsonCodec, RefreshData};
///
/// let codec = JsonCodec;
/// let body = codec
///     .encode(&ApiResponse::ok(RefreshData { token: "t2".into() }))
///     .unwrap();
///
/// let decoded = ApiResponse::<RefreshData>::decode(&codec, &body).unwrap();
/// assert_eq!(decoded.data.unwrap().token, "t2");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
