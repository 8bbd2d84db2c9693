//! Durable storage for the session token.
//!
//! The store holds exactly one string. It is read once at start-up to seed
//! the session, written on login and refresh, and cleared on logout. The
//! session manager is its only writer.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::AuthError;

/// Key-value storage of the single session token.
///
/// Every call is a suspension point; implementations may hit the disk or
/// a browser storage API.
pub trait TokenStore: Send + Sync + 'static {
    /// Returns the stored token, or `None` if there isn't one.
    fn load(&self) -> impl Future<Output = Result<Option<String>, AuthError>> + Send;

    /// Replaces the stored token.
    fn save(&self, token: &str) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Deletes the stored token. Clearing an empty store is not an error.
    fn clear(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-process store. Clones share the same slot, so a test can keep one
/// clone and inspect what the session manager wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`, as if left by a previous run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// The token currently stored.
    pub fn current(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, value: Option<String>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>, AuthError> {
        Ok(self.current())
    }

    async fn save(&self, token: &str) -> Result<(), AuthError> {
        self.set(Some(token.to_owned()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        self.set(None);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileTokenStore
// ---------------------------------------------------------------------------

/// Stores the token in a single file, surviving process restarts.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated token behind.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>, AuthError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_owned()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, token).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
