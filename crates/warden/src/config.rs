//! Combined configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use warden_guard::GuardConfig;
use warden_session::SessionConfig;

use crate::WardenError;

/// Everything Warden can be configured with.
///
/// ```json
/// {
///   "session": { "verify_interval_ms": 300000, "startup_policy": "logout" },
///   "guard": { "dashboard_route": "/dashboard" }
/// }
/// ```
///
/// Every field is optional; missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub session: SessionConfig,
    pub guard: GuardConfig,
}

impl WardenConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// [`WardenError::Config`] if the document is malformed or a field has
    /// the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, WardenError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    /// [`WardenError::Io`] if the file can't be read, [`WardenError::Config`]
    /// if it doesn't parse.
    pub async fn from_json_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, WardenError> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&contents)
    }
}
