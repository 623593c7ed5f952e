//! Error taxonomy shared by the engine, the state store and connectors.
//!
//! Every failure is fatal to the stream it happens in. Nothing here is
//! retried by the engine; retry policy belongs to the fetch layer of each
//! connector.

/// Boxed error produced by a connector's fetch layer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring or running a tap.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TapError {
    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Discovery was requested from a tap that declares no discovery.
    #[error(
        "Tap '{tap}' does not support discovery. Please set the '--catalog' command line argument and try again."
    )]
    DiscoveryNotSupported { tap: String },

    /// A dependent stream needs a parent-derived value that is not in state.
    #[error("stream '{stream}': {message}")]
    DependencyState { stream: String, message: String },

    /// `sync_one` was given a name outside the resolved stream set.
    #[error("Could not find stream '{name}' in streams list: {available:?}")]
    StreamNotFound { name: String, available: Vec<String> },

    /// A substream identifier does not follow the `key=value[,key=value]` form.
    #[error("invalid substream id '{id}': {reason}")]
    InvalidSubstreamId { id: String, reason: String },

    /// An incremental stream produced a record without its replication key.
    #[error("stream '{stream}': record is missing replication key '{key}'")]
    MissingReplicationKey { stream: String, key: String },

    /// Fetch failure reported by a connector, passed through as-is.
    #[error("stream '{stream}': fetch failed: {source}")]
    Fetch {
        stream: String,
        #[source]
        source: BoxError,
    },

    /// Persisting or loading bookmark state failed.
    #[error("state store error: {0}")]
    StateStore(#[source] BoxError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl TapError {
    /// Configuration error from any displayable message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Dependency-state error for `stream`.
    #[must_use]
    pub fn dependency(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DependencyState {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Wrap a connector fetch failure.
    #[must_use]
    pub fn fetch(stream: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Fetch {
            stream: stream.into(),
            source: source.into(),
        }
    }

    /// Stream-not-found error listing the available names in sorted order.
    #[must_use]
    pub fn stream_not_found<I, S>(name: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut available: Vec<String> = available.into_iter().map(Into::into).collect();
        available.sort();
        Self::StreamNotFound {
            name: name.into(),
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_message_points_at_catalog_flag() {
        let err = TapError::DiscoveryNotSupported {
            tap: "tap-gitlab".into(),
        };
        assert_eq!(
            err.to_string(),
            "Tap 'tap-gitlab' does not support discovery. Please set the '--catalog' command line argument and try again."
        );
    }

    #[test]
    fn stream_not_found_sorts_available_names() {
        let err = TapError::stream_not_found("missing", ["issues", "commits", "projects"]);
        assert_eq!(
            err.to_string(),
            r#"Could not find stream 'missing' in streams list: ["commits", "issues", "projects"]"#
        );
    }

    #[test]
    fn fetch_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = TapError::fetch("issues", io);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "timed out");
        assert!(err.to_string().contains("issues"));
    }

    #[test]
    fn serde_json_error_converts() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: TapError = bad.unwrap_err().into();
        assert!(matches!(err, TapError::Serialization(_)));
    }
}
