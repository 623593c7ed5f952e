//! Bookmark state: the resumable checkpoint structure.
//!
//! Serialized form (also the `value` of a STATE message):
//!
//! ```json
//! {"bookmarks": {"issues": {"version": 1700000000000,
//!                           "substreams": {"project_id=ns/proj": {
//!                               "replication_key": "updated_at",
//!                               "replication_key_value": "2024-01-02"}}}}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::substream::SubstreamId;

/// Checkpoints for every stream of a tap, keyed by stream name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,
}

/// Checkpoint for one stream, or for one substream of a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Set once, on the first write to this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Primary key values of the last record processed (full-table).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pk_fetched: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    /// Last replication key value processed (incremental and log-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<Value>,
    /// Bindings of the substream this entry belongs to.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub partition: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Substreams::is_empty")]
    pub substreams: Substreams,
}

/// Substream bookmarks in the order they were first enqueued.
///
/// Serialized as a JSON object; deserializing keeps document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substreams(Vec<(SubstreamId, Bookmark)>);

impl Substreams {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, id: &SubstreamId) -> Option<&Bookmark> {
        self.0.iter().find(|(k, _)| k == id).map(|(_, b)| b)
    }

    /// Mutable entry for `id`, appended empty when absent.
    pub fn entry(&mut self, id: &SubstreamId) -> &mut Bookmark {
        let pos = match self.0.iter().position(|(k, _)| k == id) {
            Some(pos) => pos,
            None => {
                self.0.push((id.clone(), Bookmark::default()));
                self.0.len() - 1
            }
        };
        &mut self.0[pos].1
    }

    pub fn ids(&self) -> impl Iterator<Item = &SubstreamId> {
        self.0.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubstreamId, &Bookmark)> {
        self.0.iter().map(|(k, b)| (k, b))
    }
}

impl Serialize for Substreams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for Substreams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SubstreamsVisitor;

        impl<'de> Visitor<'de> for SubstreamsVisitor {
            type Value = Substreams;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of substream ids to bookmarks")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Substreams, A::Error> {
                let mut out = Substreams::default();
                while let Some((id, bookmark)) = access.next_entry::<SubstreamId, Bookmark>()? {
                    *out.entry(&id) = bookmark;
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(SubstreamsVisitor)
    }
}

impl Bookmark {
    /// Whether no checkpoint has been written to this entry itself.
    #[must_use]
    pub fn is_unstarted(&self) -> bool {
        self.version.is_none()
            && self.last_pk_fetched.is_none()
            && self.replication_key_value.is_none()
    }
}

impl BookmarkState {
    /// Empty state, as used on a first run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    /// Stream-level bookmark, if any.
    #[must_use]
    pub fn stream(&self, stream: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)
    }

    /// Bookmark for a stream, or for one of its substreams.
    #[must_use]
    pub fn get(&self, stream: &str, substream: Option<&SubstreamId>) -> Option<&Bookmark> {
        let entry = self.bookmarks.get(stream)?;
        match substream {
            None => Some(entry),
            Some(id) => entry.substreams.get(id),
        }
    }

    /// Mutable bookmark entry, created empty when absent.
    pub fn entry(&mut self, stream: &str, substream: Option<&SubstreamId>) -> &mut Bookmark {
        let entry = self.bookmarks.entry(stream.to_string()).or_default();
        match substream {
            None => entry,
            Some(id) => entry.substreams.entry(id),
        }
    }

    /// Partition bindings recorded for a substream.
    #[must_use]
    pub fn partition(&self, stream: &str, substream: &SubstreamId) -> Option<&Map<String, Value>> {
        self.get(stream, Some(substream)).map(|b| &b.partition)
    }

    /// Known substream ids of a stream, in enqueue order.
    #[must_use]
    pub fn substream_ids(&self, stream: &str) -> Vec<SubstreamId> {
        self.bookmarks
            .get(stream)
            .map(|b| b.substreams.ids().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_state_serializes_to_empty_bookmarks() {
        let state = BookmarkState::new();
        assert_eq!(serde_json::to_value(&state).unwrap(), json!({"bookmarks": {}}));
    }

    #[test]
    fn missing_bookmarks_key_deserializes_to_empty() {
        let state: BookmarkState = serde_json::from_str("{}").unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn nested_layout_roundtrip() {
        let raw = json!({
            "bookmarks": {
                "issues": {
                    "substreams": {
                        "project_id=ns/proj": {
                            "version": 1,
                            "replication_key": "updated_at",
                            "replication_key_value": "2024-01-02T00:00:00Z",
                            "partition": {"project_id": "ns/proj"}
                        }
                    }
                },
                "projects": {"version": 5, "last_pk_fetched": {"id": 42}}
            }
        });
        let state: BookmarkState = serde_json::from_value(raw.clone()).unwrap();
        let id = SubstreamId::new("project_id=ns/proj");
        let sub = state.get("issues", Some(&id)).unwrap();
        assert_eq!(sub.replication_key.as_deref(), Some("updated_at"));
        assert_eq!(state.partition("issues", &id).unwrap()["project_id"], "ns/proj");
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn entry_creates_nested_substream() {
        let mut state = BookmarkState::new();
        let id = SubstreamId::new("parent_id=7");
        state.entry("child", Some(&id)).version = Some(3);
        assert_eq!(state.substream_ids("child"), vec![id.clone()]);
        assert_eq!(state.get("child", Some(&id)).unwrap().version, Some(3));
        assert!(state.stream("child").unwrap().is_unstarted());
    }

    #[test]
    fn substreams_keep_enqueue_order() {
        let mut state = BookmarkState::new();
        let ten = SubstreamId::new("parent_id=10");
        let seven = SubstreamId::new("parent_id=7");
        state.entry("child", Some(&ten));
        state.entry("child", Some(&seven));
        state.entry("child", Some(&ten)).version = Some(1);
        assert_eq!(state.substream_ids("child"), vec![ten.clone(), seven.clone()]);

        let text = serde_json::to_string(&state).unwrap();
        assert!(text.find("parent_id=10").unwrap() < text.find("parent_id=7").unwrap());
        let back: BookmarkState = serde_json::from_str(&text).unwrap();
        assert_eq!(back.substream_ids("child"), vec![ten, seven]);
        assert_eq!(back, state);
    }

    #[test]
    fn substream_ids_of_unknown_stream_is_empty() {
        assert!(BookmarkState::new().substream_ids("nope").is_empty());
    }
}
