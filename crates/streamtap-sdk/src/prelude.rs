//! Convenience re-exports for connector authors.
//!
//! ```ignore
//! use streamtap_sdk::prelude::*;
//! ```

// Connector traits
pub use crate::definition::{StreamSet, TapDefinition};
pub use crate::stream::{substream_params, Partitioning, RecordContext, TapStream};

// Engine
pub use crate::config::{Input, TapConfig};
pub use crate::tap::{StreamPhase, Tap, TapBuilder};

// Data model
pub use streamtap_types::bookmark::{Bookmark, BookmarkState};
pub use streamtap_types::catalog::Catalog;
pub use streamtap_types::error::BoxError;
pub use streamtap_types::plugin::{Capability, PluginInfo};
pub use streamtap_types::stream::{Params, Record, ReplicationMethod, StreamDescriptor};
pub use streamtap_types::substream::SubstreamId;
pub use streamtap_types::TapError;

// Fetch plumbing
pub use futures::stream::BoxStream;
