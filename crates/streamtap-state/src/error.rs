//! State store error types.

/// Errors produced by [`StateStore`](crate::StateStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// File-system I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The state document is not valid bookmark JSON.
    #[error("invalid state document: {0}")]
    Json(#[from] serde_json::Error),

    /// Temp-file rename onto the target path failed.
    #[error("failed to persist state file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_poisoned_displays() {
        let err = StateError::LockPoisoned;
        assert_eq!(err.to_string(), "state store lock poisoned");
    }

    #[test]
    fn io_error_wraps() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StateError::Io(inner);
        assert!(err.to_string().contains("i/o"));
    }

    #[test]
    fn json_error_displays_context() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let msg = StateError::from(inner).to_string();
        assert!(msg.starts_with("invalid state document"), "got: {msg}");
    }
}
