//! Backend wire types for Warden.
//!
//! This crate defines what the session layer exchanges with the
//! authentication backend:
//!
//! - **Types** ([`ApiResponse`], [`User`], [`Credentials`], [`LoginData`],
//!   [`RefreshData`]) - the shapes that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) - how response bodies are
//!   turned into those types.
//! - **Errors** ([`ProtocolError`]) - what can go wrong while doing so.
//!
//! It knows nothing about sessions, timers or routes.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ApiResponse, Credentials, LoginData, RefreshData, User, UserId};
