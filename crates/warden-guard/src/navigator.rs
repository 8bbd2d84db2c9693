//! Navigation capability.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// Moves the host application to a named route.
///
/// Implemented over the app's router. Must not block: the guard calls it
/// from async contexts.
pub trait Navigator: Send + Sync + 'static {
    fn redirect(&self, route: &str);
}

/// A navigator that only remembers where it was sent.
///
/// For headless hosts and tests. Clones share one history.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    history: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every route redirected to, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        debug!(route, "navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_owned());
    }
}
