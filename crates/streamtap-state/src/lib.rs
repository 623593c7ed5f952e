//! Bookmark state persistence for streamtap.
//!
//! Provides the [`StateStore`] trait, a [`JsonFileStateStore`] that keeps
//! the state as the same JSON document a STATE message carries, and a
//! [`MemoryStateStore`] for tests and embedding.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::StateStore;
pub use error::StateError;
pub use file::JsonFileStateStore;
pub use memory::MemoryStateStore;
