//! Connector SDK and sync engine for streamtap.
//!
//! Connectors implement [`TapStream`](stream::TapStream) for each data
//! entity and [`TapDefinition`](definition::TapDefinition) once. The engine
//! orders streams by dependency, resolves the input catalog, pulls records,
//! maintains bookmarks and writes Singer protocol messages.

#![warn(clippy::pedantic)]

pub mod bookmarks;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod ordering;
pub mod output;
pub mod prelude;
pub mod stream;
pub mod summary;
pub mod tap;

pub use streamtap_state as state;
pub use streamtap_types as types;
