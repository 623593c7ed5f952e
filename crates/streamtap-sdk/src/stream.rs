//! Stream trait implemented by connectors, and substream enumeration.
//!
//! A connector registers one [`TapStream`] per data entity. The engine asks
//! each stream for its substreams, builds request parameters per substream,
//! pulls records from [`TapStream::records`] and feeds each record through
//! [`TapStream::post_process`] before bookmarking and emitting it.

use futures::stream::BoxStream;
use serde_json::Value;
use streamtap_types::bookmark::BookmarkState;
use streamtap_types::stream::{Params, Record, StreamDescriptor};
use streamtap_types::substream::SubstreamId;
use streamtap_types::TapError;

use crate::bookmarks;
use crate::config::TapConfig;

/// Substream enumeration strategy for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    /// One pass without a substream id.
    Unpartitioned,
    /// One substream per element of the config array `setting`, bound to
    /// `binding` (e.g. `project_ids` / `project_id`).
    ConfigList {
        setting: &'static str,
        binding: &'static str,
    },
    /// Substreams enqueued into this stream's bookmark by a parent stream.
    Pending,
}

impl Partitioning {
    /// Enumerate substream ids for `stream`, in processing order.
    ///
    /// An empty result means the stream has no substreams to process; it
    /// is distinct from `Unpartitioned`, which returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when a `ConfigList` setting is
    /// missing or not an array, and [`TapError::InvalidSubstreamId`] when a
    /// configured value cannot be encoded.
    pub fn enumerate(
        self,
        stream: &str,
        config: &TapConfig,
        state: &BookmarkState,
    ) -> Result<Option<Vec<SubstreamId>>, TapError> {
        match self {
            Self::Unpartitioned => Ok(None),
            Self::ConfigList { setting, binding } => {
                let values = config.get_array(setting).ok_or_else(|| {
                    TapError::config(format!(
                        "stream '{stream}' requires '{setting}' to be a list in config"
                    ))
                })?;
                values
                    .iter()
                    .map(|value| SubstreamId::from_bindings([(binding, scalar_text(value))]))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Some)
            }
            Self::Pending => Ok(Some(state.substream_ids(stream))),
        }
    }
}

/// Render a config scalar without JSON quoting.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Default request parameters: the substream's bindings as strings.
///
/// # Errors
///
/// Returns [`TapError::InvalidSubstreamId`] for a malformed id.
pub fn substream_params(substream: Option<&SubstreamId>) -> Result<Params, TapError> {
    substream.map_or_else(|| Ok(Params::new()), SubstreamId::to_params)
}

/// Mutable view handed to [`TapStream::post_process`].
///
/// Only the dependent-stream enqueue operation is exposed; bookmarks for the
/// current record are written by the engine after post-processing.
pub struct RecordContext<'a> {
    pub stream: &'a str,
    pub substream: Option<&'a SubstreamId>,
    pub params: &'a Params,
    pub config: &'a TapConfig,
    state: &'a mut BookmarkState,
}

impl<'a> RecordContext<'a> {
    /// Context for one record. The engine builds these per record; connector
    /// tests build them to exercise `post_process` directly.
    pub fn new(
        stream: &'a str,
        substream: Option<&'a SubstreamId>,
        params: &'a Params,
        config: &'a TapConfig,
        state: &'a mut BookmarkState,
    ) -> Self {
        Self {
            stream,
            substream,
            params,
            config,
            state,
        }
    }

    /// Tell the engine that `stream` has a new substream to process.
    ///
    /// Returns `true` when the substream was not known yet.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::InvalidSubstreamId`] for a malformed id.
    pub fn ensure_substream_state_pending(
        &mut self,
        stream: &str,
        substream: &SubstreamId,
    ) -> Result<bool, TapError> {
        bookmarks::ensure_substream_state_pending(self.state, stream, substream)
    }

    /// Read-only view of the current state.
    #[must_use]
    pub fn state(&self) -> &BookmarkState {
        &*self.state
    }
}

/// A data entity a connector can extract.
pub trait TapStream: Send + Sync {
    fn descriptor(&self) -> &StreamDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn partitioning(&self) -> Partitioning {
        Partitioning::Unpartitioned
    }

    /// Substreams for this run. Recomputed on every sync.
    ///
    /// # Errors
    ///
    /// See [`Partitioning::enumerate`].
    fn substreams(
        &self,
        config: &TapConfig,
        state: &BookmarkState,
    ) -> Result<Option<Vec<SubstreamId>>, TapError> {
        self.partitioning().enumerate(self.name(), config, state)
    }

    /// Request parameters for one substream (or the single pass).
    ///
    /// # Errors
    ///
    /// Dependent streams return [`TapError::DependencyState`] when a
    /// parent-derived value is missing from `state`.
    fn params(
        &self,
        substream: Option<&SubstreamId>,
        _config: &TapConfig,
        _state: &BookmarkState,
    ) -> Result<Params, TapError> {
        substream_params(substream)
    }

    /// Adjust a record after field projection. Returning `None` drops it.
    ///
    /// # Errors
    ///
    /// Any error aborts the stream.
    fn post_process(
        &self,
        record: Record,
        _ctx: &mut RecordContext<'_>,
    ) -> Result<Option<Record>, TapError> {
        Ok(Some(record))
    }

    /// Fetch records for one set of params, in source order.
    fn records<'a>(&'a self, params: &'a Params) -> BoxStream<'a, Result<Record, TapError>>;
}
