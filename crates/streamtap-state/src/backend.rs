//! State store trait definition.
//!
//! [`StateStore`] is the persistence contract for a tap's
//! [`BookmarkState`]. The engine loads once at startup and saves at every
//! checkpoint.

use streamtap_types::bookmark::BookmarkState;

use crate::error;

/// Storage contract for bookmark state.
///
/// Implementations must be `Send + Sync` for use behind `Box<dyn StateStore>`.
pub trait StateStore: Send + Sync {
    /// Read the persisted state.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure
    /// or when the stored document is not valid bookmark JSON.
    fn load(&self) -> error::Result<Option<BookmarkState>>;

    /// Replace the persisted state with `state`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn save(&self, state: &BookmarkState) -> error::Result<()>;
}
