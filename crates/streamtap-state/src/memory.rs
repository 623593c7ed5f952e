//! In-process [`StateStore`] holding the last saved state.

use std::sync::{Mutex, MutexGuard};

use streamtap_types::bookmark::BookmarkState;

use crate::backend::StateStore;
use crate::error::{self, StateError};

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<BookmarkState>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`, as if a previous run had saved it.
    #[must_use]
    pub fn with_state(state: BookmarkState) -> Self {
        Self {
            inner: Mutex::new(Some(state)),
        }
    }

    /// Clone of the last saved state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn snapshot(&self) -> error::Result<Option<BookmarkState>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, Option<BookmarkState>>> {
        self.inner.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> error::Result<Option<BookmarkState>> {
        self.snapshot()
    }

    fn save(&self, state: &BookmarkState) -> error::Result<()> {
        *self.lock()? = Some(state.clone());
        Ok(())
    }
}
