//! The authentication backend the session layer talks to.
//!
//! Warden doesn't issue or validate tokens itself; that's the server's job.
//! Instead it defines the [`AuthBackend`] trait: four async calls mirroring
//! the backend's endpoints. Implement it over your HTTP client in the app,
//! with a scripted fake in tests.
//!
//! Every call takes the token explicitly. The session manager is the only
//! owner of the token, so adapters never reach into storage on their own.

use std::future::Future;

use warden_protocol::{ApiResponse, Credentials, LoginData, RefreshData, User};

use crate::AuthError;

/// Network-facing authentication capability.
///
/// # Error contract
///
/// - A reachable backend that says "no" answers `Ok(ApiResponse { success: false, .. })`.
/// - An unreachable or timed-out backend answers `Err(AuthError::NetworkFailure)`.
///
/// Timeouts are the adapter's policy; the session layer never retries on
/// its own beyond the periodic verification interval.
///
/// # Example
///
/// ```rust
/// use warden_protocol::{ApiResponse, Credentials, LoginData, RefreshData, User};
/// use warden_session::{AuthBackend, AuthError};
///
/// /// Rejects everything. Handy as a placeholder while the real client is wired up.
/// struct OfflineBackend;
///
/// impl AuthBackend for OfflineBackend {
///     async fn verify(&self, _token: &str) -> Result<ApiResponse<User>, AuthError> {
///         Err(AuthError::NetworkFailure("offline".into()))
///     }
///
///     async fn refresh(&self, _token: &str) -> Result<ApiResponse<RefreshData>, AuthError> {
///         Err(AuthError::NetworkFailure("offline".into()))
///     }
///
///     async fn login(&self, _credentials: &Credentials) -> Result<ApiResponse<LoginData>, AuthError> {
///         Err(AuthError::NetworkFailure("offline".into()))
///     }
///
///     async fn logout(&self, _token: &str) -> Result<(), AuthError> {
///         Ok(())
///     }
/// }
/// ```
pub trait AuthBackend: Send + Sync + 'static {
    /// Validates `token`. A successful answer may carry a fresh copy of
    /// the user record.
    fn verify(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ApiResponse<User>, AuthError>> + Send;

    /// Exchanges the current (possibly still valid) token for a new one.
    fn refresh(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ApiResponse<RefreshData>, AuthError>> + Send;

    /// Exchanges credentials for a user record and a token.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<ApiResponse<LoginData>, AuthError>> + Send;

    /// Tells the backend the token is no longer in use.
    ///
    /// Best effort: the local session is already gone by the time this
    /// runs, whatever it returns.
    fn logout(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;
}
