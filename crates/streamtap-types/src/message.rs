//! Singer protocol messages, one JSON object per output line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bookmark::BookmarkState;
use crate::stream::Record;

/// A single protocol line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },
    Record {
        stream: String,
        record: Record,
    },
    State {
        value: BookmarkState,
    },
}

impl Message {
    /// Serialize as a single line without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
