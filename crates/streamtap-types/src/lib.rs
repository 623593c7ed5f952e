//! Shared streamtap data model: stream descriptors, substream ids, bookmark
//! state, Singer catalogs, protocol messages and the error taxonomy.
//!
//! This crate has no I/O and is safe to depend on from both the engine and
//! state persistence crates.

#![warn(clippy::pedantic)]

pub mod bookmark;
pub mod catalog;
pub mod error;
pub mod message;
pub mod plugin;
pub mod stream;
pub mod substream;

pub use error::TapError;
