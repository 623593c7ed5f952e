//! Bookmark engine: per-record checkpoint updates and dependent-stream
//! enqueueing.
//!
//! Updates are in-memory and synchronous. Durability comes from the
//! orchestrator's checkpoint after each stream completes.

use serde_json::{Map, Value};
use streamtap_types::bookmark::BookmarkState;
use streamtap_types::stream::{Record, ReplicationMethod, StreamDescriptor};
use streamtap_types::substream::SubstreamId;
use streamtap_types::TapError;

/// Version marker written on the first write to a bookmark entry.
fn new_version() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Advance the bookmark for `descriptor` (and `substream`) past `record`.
///
/// Full-table streams store the record's primary key values, last write
/// wins. Incremental and log-based streams store the record's replication
/// key value as-is; callers must deliver records in ascending key order.
///
/// # Errors
///
/// Returns [`TapError::MissingReplicationKey`] when an incremental or
/// log-based record lacks its replication key field.
pub fn update_bookmark(
    state: &mut BookmarkState,
    descriptor: &StreamDescriptor,
    substream: Option<&SubstreamId>,
    record: &Record,
) -> Result<(), TapError> {
    let entry = state.entry(&descriptor.name, substream);
    if entry.version.is_none() {
        entry.version = Some(new_version());
    }

    match descriptor.replication_method {
        ReplicationMethod::FullTable => {
            let pk: Map<String, Value> = descriptor
                .primary_keys
                .iter()
                .map(|key| (key.clone(), record.get(key).cloned().unwrap_or(Value::Null)))
                .collect();
            entry.last_pk_fetched = Some(pk);
        }
        ReplicationMethod::Incremental | ReplicationMethod::LogBased => {
            let key = descriptor.replication_key.as_deref().ok_or_else(|| {
                TapError::config(format!(
                    "stream '{}' has no replication key",
                    descriptor.name
                ))
            })?;
            let value = record
                .get(key)
                .cloned()
                .ok_or_else(|| TapError::MissingReplicationKey {
                    stream: descriptor.name.clone(),
                    key: key.to_string(),
                })?;
            entry.replication_key = Some(key.to_string());
            entry.replication_key_value = Some(value);
        }
    }
    Ok(())
}

/// Declare that `stream` has a substream to process.
///
/// Creates an empty entry whose `partition` holds the id's bindings.
/// Existing entries, including their bookmarks, are left untouched.
/// Returns `true` when a new entry was created.
///
/// # Errors
///
/// Returns [`TapError::InvalidSubstreamId`] when the id does not parse.
pub fn ensure_substream_state_pending(
    state: &mut BookmarkState,
    stream: &str,
    substream: &SubstreamId,
) -> Result<bool, TapError> {
    if state.get(stream, Some(substream)).is_some() {
        return Ok(false);
    }
    let partition = substream.to_params()?;
    state.entry(stream, Some(substream)).partition = partition;
    tracing::debug!(stream, substream = %substream, "Substream queued");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn full_table() -> StreamDescriptor {
        StreamDescriptor::new("releases", json!({"type": "object"}))
            .primary_keys(["project_id", "tag_name"])
    }

    fn incremental() -> StreamDescriptor {
        StreamDescriptor::new("issues", json!({"type": "object"}))
            .primary_keys(["id"])
            .replication_key("updated_at")
    }

    #[test]
    fn full_table_keeps_last_primary_key() {
        let mut state = BookmarkState::new();
        let desc = full_table();
        for (project, tag) in [("a", "v2"), ("a", "v10"), ("a", "v1")] {
            update_bookmark(&mut state, &desc, None, &record(json!({"project_id": project, "tag_name": tag, "name": "x"})))
                .unwrap();
        }
        let entry = state.stream("releases").unwrap();
        assert_eq!(
            Value::Object(entry.last_pk_fetched.clone().unwrap()),
            json!({"project_id": "a", "tag_name": "v1"})
        );
        assert!(entry.replication_key_value.is_none());
    }

    #[test]
    fn incremental_keeps_last_value() {
        let mut state = BookmarkState::new();
        let desc = incremental();
        let id = SubstreamId::new("project_id=ns/proj");
        for ts in ["2024-01-01", "2024-01-02", "2024-01-02", "2024-02-01"] {
            update_bookmark(&mut state, &desc, Some(&id), &record(json!({"id": 1, "updated_at": ts})))
                .unwrap();
        }
        let entry = state.get("issues", Some(&id)).unwrap();
        assert_eq!(entry.replication_key.as_deref(), Some("updated_at"));
        assert_eq!(entry.replication_key_value, Some(json!("2024-02-01")));
        assert!(entry.last_pk_fetched.is_none());
        // Substream writes do not touch the stream-level entry's checkpoint.
        assert!(state.stream("issues").unwrap().is_unstarted());
    }

    #[test]
    fn keyless_log_based_tracks_last_position() {
        let desc = StreamDescriptor::new("changes", json!({"type": "object"}))
            .replication_method(ReplicationMethod::LogBased)
            .replication_key("lsn");
        desc.validate().unwrap();
        assert_eq!(desc.replication_method, ReplicationMethod::LogBased);

        let mut state = BookmarkState::new();
        for lsn in [100, 104, 109] {
            update_bookmark(&mut state, &desc, None, &record(json!({"lsn": lsn, "op": "u"}))).unwrap();
        }
        let entry = state.stream("changes").unwrap();
        assert_eq!(entry.replication_key.as_deref(), Some("lsn"));
        assert_eq!(entry.replication_key_value, Some(json!(109)));
        assert!(entry.last_pk_fetched.is_none());
        assert!(entry.version.is_some());
    }

    #[test]
    fn out_of_order_values_pass_through() {
        let mut state = BookmarkState::new();
        let desc = incremental();
        update_bookmark(&mut state, &desc, None, &record(json!({"id": 1, "updated_at": 5}))).unwrap();
        update_bookmark(&mut state, &desc, None, &record(json!({"id": 2, "updated_at": 3}))).unwrap();
        assert_eq!(state.stream("issues").unwrap().replication_key_value, Some(json!(3)));
    }

    #[test]
    fn version_written_once() {
        let mut state = BookmarkState::new();
        let desc = full_table();
        let rec = record(json!({"project_id": "a", "tag_name": "v1"}));
        update_bookmark(&mut state, &desc, None, &rec).unwrap();
        let first = state.stream("releases").unwrap().version;
        assert!(first.is_some());
        state.entry("releases", None).version = Some(1);
        update_bookmark(&mut state, &desc, None, &rec).unwrap();
        assert_eq!(state.stream("releases").unwrap().version, Some(1));
    }

    #[test]
    fn missing_replication_key_is_error() {
        let mut state = BookmarkState::new();
        let err = update_bookmark(&mut state, &incremental(), None, &record(json!({"id": 1}))).unwrap_err();
        assert!(matches!(err, TapError::MissingReplicationKey { ref key, .. } if key == "updated_at"));
    }

    #[test]
    fn missing_primary_key_field_recorded_as_null() {
        let mut state = BookmarkState::new();
        update_bookmark(&mut state, &full_table(), None, &record(json!({"project_id": "a"}))).unwrap();
        let pk = state.stream("releases").unwrap().last_pk_fetched.clone().unwrap();
        assert_eq!(pk.get("tag_name"), Some(&Value::Null));
    }

    #[test]
    fn ensure_pending_seeds_partition_once() {
        let mut state = BookmarkState::new();
        let id = SubstreamId::new("group_id=7,epic_iid=3");
        assert!(ensure_substream_state_pending(&mut state, "epic_issues", &id).unwrap());
        assert_eq!(
            Value::Object(state.partition("epic_issues", &id).unwrap().clone()),
            json!({"group_id": "7", "epic_iid": "3"})
        );

        state.entry("epic_issues", Some(&id)).version = Some(11);
        assert!(!ensure_substream_state_pending(&mut state, "epic_issues", &id).unwrap());
        assert_eq!(state.get("epic_issues", Some(&id)).unwrap().version, Some(11));
    }

    #[test]
    fn ensure_pending_rejects_malformed_id() {
        let mut state = BookmarkState::new();
        assert!(ensure_substream_state_pending(&mut state, "child", &SubstreamId::new("seven")).is_err());
        assert!(state.is_empty());
    }
}
