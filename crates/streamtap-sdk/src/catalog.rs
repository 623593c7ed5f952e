//! Catalog resolution and discovery output.
//!
//! [`resolve`] merges a stream's declared schema with an optional input
//! catalog into an [`EffectiveStream`]. [`build_catalog`] produces the
//! discovery document from resolved streams; feeding that document back
//! through [`resolve`] yields the same effective streams.

use std::collections::BTreeSet;

use serde_json::Value;
use streamtap_types::catalog::{Catalog, CatalogEntry, Inclusion, Metadata, MetadataEntry};
use streamtap_types::message::Message;
use streamtap_types::stream::{Record, StreamDescriptor};

/// Which record fields survive projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// Every field, including ones the schema does not declare.
    All,
    /// Only these fields.
    Only(BTreeSet<String>),
}

impl FieldSelection {
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(field),
        }
    }

    /// Drop deselected fields from `record`.
    #[must_use]
    pub fn project(&self, mut record: Record) -> Record {
        if let Self::Only(fields) = self {
            record.retain(|key, _| fields.contains(key));
        }
        record
    }
}

/// A stream as it will be synced in this run.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveStream {
    /// Declaration, with the schema replaced by the catalog's when given.
    pub descriptor: StreamDescriptor,
    pub selected: bool,
    pub fields: FieldSelection,
    /// Schema narrowed to the selected fields.
    pub schema: Value,
}

impl EffectiveStream {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// SCHEMA message announcing this stream.
    #[must_use]
    pub fn schema_message(&self) -> Message {
        Message::Schema {
            stream: self.descriptor.name.clone(),
            schema: self.schema.clone(),
            key_properties: self.descriptor.primary_keys.clone(),
            bookmark_properties: self.descriptor.replication_key.iter().cloned().collect(),
        }
    }
}

fn is_automatic(descriptor: &StreamDescriptor, field: &str) -> bool {
    descriptor.primary_keys.iter().any(|k| k == field)
        || descriptor.replication_key.as_deref() == Some(field)
}

fn field_selected(descriptor: &StreamDescriptor, entry: &CatalogEntry, field: &str) -> bool {
    if is_automatic(descriptor, field) {
        return true;
    }
    match entry.field_metadata(field) {
        Some(md) => match md.inclusion {
            Some(Inclusion::Unsupported) => false,
            Some(Inclusion::Automatic) => true,
            _ => md.selection().unwrap_or(true),
        },
        None => true,
    }
}

/// Narrow `schema.properties` (and `schema.required`) to `fields`.
fn narrow_schema(schema: &Value, fields: &FieldSelection) -> Value {
    let FieldSelection::Only(keep) = fields else {
        return schema.clone();
    };
    let mut narrowed = schema.clone();
    if let Some(props) = narrowed.get_mut("properties").and_then(Value::as_object_mut) {
        props.retain(|name, _| keep.contains(name));
    }
    if let Some(required) = narrowed.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|name| name.as_str().is_some_and(|n| keep.contains(n)));
    }
    narrowed
}

/// Resolve one stream against an optional input catalog.
///
/// Catalog entries for other streams have no effect.
#[must_use]
pub fn resolve(descriptor: &StreamDescriptor, catalog: Option<&Catalog>) -> EffectiveStream {
    let Some(entry) = catalog.and_then(|c| c.entry(&descriptor.name)) else {
        return EffectiveStream {
            descriptor: descriptor.clone(),
            selected: true,
            fields: FieldSelection::All,
            schema: descriptor.schema.clone(),
        };
    };

    let mut base = descriptor.clone();
    if entry.schema.is_object() {
        base.schema = entry.schema.clone();
    }

    let selected = entry
        .stream_metadata()
        .and_then(Metadata::selection)
        .unwrap_or(true);

    let properties = base.property_names();
    let chosen: BTreeSet<String> = properties
        .iter()
        .filter(|field| field_selected(&base, entry, field))
        .cloned()
        .collect();
    let fields = if chosen.len() == properties.len() {
        FieldSelection::All
    } else {
        FieldSelection::Only(chosen)
    };

    let schema = narrow_schema(&base.schema, &fields);
    EffectiveStream {
        descriptor: base,
        selected,
        fields,
        schema,
    }
}

/// Discovery catalog entry for one resolved stream.
#[must_use]
pub fn catalog_entry(stream: &EffectiveStream) -> CatalogEntry {
    let desc = &stream.descriptor;

    let mut metadata = vec![MetadataEntry::stream(Metadata {
        selected: Some(stream.selected),
        table_key_properties: Some(desc.primary_keys.clone()),
        forced_replication_method: Some(desc.replication_method),
        valid_replication_keys: desc.replication_key.clone().map(|k| vec![k]),
        ..Metadata::default()
    })];

    for field in desc.property_names() {
        let md = if is_automatic(desc, &field) {
            Metadata {
                inclusion: Some(Inclusion::Automatic),
                ..Metadata::default()
            }
        } else {
            Metadata {
                inclusion: Some(Inclusion::Available),
                selected: Some(stream.fields.contains(&field)),
                ..Metadata::default()
            }
        };
        metadata.push(MetadataEntry::property(field, md));
    }

    CatalogEntry {
        tap_stream_id: desc.name.clone(),
        stream: desc.name.clone(),
        schema: desc.schema.clone(),
        key_properties: desc.primary_keys.clone(),
        replication_key: desc.replication_key.clone(),
        replication_method: Some(desc.replication_method),
        metadata,
    }
}

/// Discovery catalog for a set of resolved streams, in the given order.
#[must_use]
pub fn build_catalog<'a>(streams: impl IntoIterator<Item = &'a EffectiveStream>) -> Catalog {
    Catalog {
        streams: streams.into_iter().map(catalog_entry).collect(),
    }
}
