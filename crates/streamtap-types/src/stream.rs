//! Stream descriptors and the record/parameter shapes that flow through them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TapError;

/// One extracted record: a JSON object.
pub type Record = Map<String, Value>;

/// Request parameters handed to a stream's fetch layer for one substream.
pub type Params = Map<String, Value>;

/// How a stream's progress is checkpointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    /// Re-extract everything; bookmark the last primary key seen.
    FullTable,
    /// Extract rows newer than the stored replication key value.
    Incremental,
    /// Pass-through change log position stored as the replication key value.
    LogBased,
}

impl ReplicationMethod {
    /// Whether this method checkpoints a replication key value.
    #[must_use]
    pub fn uses_replication_key(self) -> bool {
        matches!(self, Self::Incremental | Self::LogBased)
    }

    /// Wire-format string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullTable => "FULL_TABLE",
            Self::Incremental => "INCREMENTAL",
            Self::LogBased => "LOG_BASED",
        }
    }
}

impl std::fmt::Display for ReplicationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one extractable data entity.
///
/// Built once at tap startup with the chained setters and checked with
/// [`StreamDescriptor::validate`] before any sync runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    pub replication_method: ReplicationMethod,
    pub schema: Value,
    /// Streams whose sync must complete before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_streams: Vec<String>,
}

impl StreamDescriptor {
    /// A full-table root stream with no keys.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            primary_keys: Vec::new(),
            replication_key: None,
            replication_method: ReplicationMethod::FullTable,
            schema,
            parent_streams: Vec::new(),
        }
    }

    #[must_use]
    pub fn primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the replication key. Switches a full-table stream to incremental.
    #[must_use]
    pub fn replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        if self.replication_method == ReplicationMethod::FullTable {
            self.replication_method = ReplicationMethod::Incremental;
        }
        self
    }

    #[must_use]
    pub fn replication_method(mut self, method: ReplicationMethod) -> Self {
        self.replication_method = method;
        self
    }

    /// Declare a parent stream. Order of calls is preserved.
    #[must_use]
    pub fn parent(mut self, stream: impl Into<String>) -> Self {
        self.parent_streams.push(stream.into());
        self
    }

    /// Whether this stream depends on any other stream.
    #[must_use]
    pub fn is_dependent(&self) -> bool {
        !self.parent_streams.is_empty()
    }

    /// Property names declared in the schema, in schema order.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check the declaration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] when the name is empty, the schema
    /// is not an object, keys are missing for the replication method, or the
    /// stream lists itself as a parent.
    pub fn validate(&self) -> Result<(), TapError> {
        if self.name.trim().is_empty() {
            return Err(TapError::config("stream name must not be empty"));
        }
        if !self.schema.is_object() {
            return Err(TapError::config(format!(
                "stream '{}': schema must be a JSON object",
                self.name
            )));
        }
        if self.primary_keys.is_empty() && self.replication_method != ReplicationMethod::LogBased {
            return Err(TapError::config(format!(
                "stream '{}': primary keys are required for {} replication",
                self.name, self.replication_method
            )));
        }
        if self.replication_method.uses_replication_key() && self.replication_key.is_none() {
            return Err(TapError::config(format!(
                "stream '{}': {} replication requires a replication key",
                self.name, self.replication_method
            )));
        }
        if self.parent_streams.iter().any(|p| p == &self.name) {
            return Err(TapError::config(format!(
                "stream '{}' cannot depend on itself",
                self.name
            )));
        }
        Ok(())
    }
}
