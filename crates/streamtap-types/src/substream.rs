//! Substream identifiers.
//!
//! A substream id encodes one or more partition key bindings as
//! comma-separated `key=value` pairs, e.g. `project_id=ns/proj` or
//! `group_id=7,epic_iid=3`. Ids are unique per stream only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TapError;

/// Opaque per-stream partition identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubstreamId(String);

impl SubstreamId {
    /// Wrap an already formatted id without checking it.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Format an id from ordered bindings.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::InvalidSubstreamId`] when a key is empty or a key
    /// or value contains a separator that would make the id unparseable.
    pub fn from_bindings<I, K, V>(bindings: I) -> Result<Self, TapError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut parts = Vec::new();
        for (key, value) in bindings {
            let (key, value) = (key.as_ref(), value.as_ref());
            let pair = format!("{key}={value}");
            if key.is_empty() || key.contains(['=', ',']) {
                return Err(invalid(&pair, "binding key must be non-empty and free of '=' and ','"));
            }
            if value.contains(',') {
                return Err(invalid(&pair, "binding value must not contain ','"));
            }
            parts.push(pair);
        }
        if parts.is_empty() {
            return Err(invalid("", "at least one binding is required"));
        }
        Ok(Self(parts.join(",")))
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the bindings back out, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::InvalidSubstreamId`] when a segment has no `=` or
    /// an empty key.
    pub fn bindings(&self) -> Result<Vec<(&str, &str)>, TapError> {
        self.0
            .split(',')
            .map(|segment| match segment.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key, value)),
                _ => Err(invalid(&self.0, &format!("segment '{segment}' is not key=value"))),
            })
            .collect()
    }

    /// Value bound to `key`, if the id parses and contains it.
    #[must_use]
    pub fn binding(&self, key: &str) -> Option<&str> {
        self.bindings()
            .ok()?
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Bindings as a JSON object of string values.
    ///
    /// # Errors
    ///
    /// Same as [`SubstreamId::bindings`].
    pub fn to_params(&self) -> Result<Map<String, Value>, TapError> {
        Ok(self
            .bindings()?
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect())
    }
}

fn invalid(id: &str, reason: &str) -> TapError {
    TapError::InvalidSubstreamId {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

impl std::fmt::Display for SubstreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for SubstreamId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}
