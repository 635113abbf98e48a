//! Last-known thread identifier.

use std::sync::{PoisonError, RwLock};

/// Single-slot cell holding the most recent thread ID.
///
/// Shared by every channel of a bridge; the last write wins.
#[derive(Debug, Default)]
pub struct LastSession {
    thread_id: RwLock<Option<String>>,
}

impl LastSession {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored thread ID.
    pub fn set(&self, thread_id: impl Into<String>) {
        *self.thread_id.write().unwrap_or_else(PoisonError::into_inner) = Some(thread_id.into());
    }

    /// Read the stored thread ID without clearing it.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.thread_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true once any thread has started.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.thread_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
