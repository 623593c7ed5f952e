//! Singer catalog document.
//!
//! The catalog is both the output of discovery and the optional input that
//! selects streams and fields for a sync run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stream::ReplicationMethod;

/// Top-level catalog: `{"streams": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// Entry whose `tap_stream_id` matches `stream`.
    #[must_use]
    pub fn entry(&self, stream: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|e| e.tap_stream_id == stream)
    }
}

/// Catalog description of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub tap_stream_id: String,
    pub stream: String,
    /// Null when the entry does not override the declared schema.
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub key_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_method: Option<ReplicationMethod>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl CatalogEntry {
    /// Metadata attached to breadcrumb `[]`.
    #[must_use]
    pub fn stream_metadata(&self) -> Option<&Metadata> {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.is_empty())
            .map(|m| &m.metadata)
    }

    /// Metadata attached to breadcrumb `["properties", field]`.
    #[must_use]
    pub fn field_metadata(&self, field: &str) -> Option<&Metadata> {
        self.metadata
            .iter()
            .find(|m| m.breadcrumb.len() == 2 && m.breadcrumb[0] == "properties" && m.breadcrumb[1] == field)
            .map(|m| &m.metadata)
    }
}

/// Breadcrumb-addressed metadata entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub breadcrumb: Vec<String>,
    pub metadata: Metadata,
}

impl MetadataEntry {
    #[must_use]
    pub fn stream(metadata: Metadata) -> Self {
        Self {
            breadcrumb: Vec::new(),
            metadata,
        }
    }

    #[must_use]
    pub fn property(field: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            breadcrumb: vec!["properties".to_string(), field.into()],
            metadata,
        }
    }
}

/// Whether a field may be deselected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    /// Always emitted (keys, replication key).
    Automatic,
    /// Emitted unless deselected.
    Available,
    /// Never emitted.
    Unsupported,
}

/// Metadata values recognised by the resolver. Unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<Inclusion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_by_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_key_properties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_replication_method: Option<ReplicationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_replication_keys: Option<Vec<String>>,
}

impl Metadata {
    /// Explicit selection, falling back to `selected-by-default`.
    #[must_use]
    pub fn selection(&self) -> Option<bool> {
        self.selected.or(self.selected_by_default)
    }
}
