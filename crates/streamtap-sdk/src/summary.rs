//! Sync result types.

/// Counts for one stream's sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub stream: String,
    /// Substream passes completed (1 for an unpartitioned stream).
    pub substreams: u64,
    /// Records pulled from the fetch layer.
    pub records_read: u64,
    /// RECORD messages written. Zero for a silently synced parent.
    pub records_emitted: u64,
    pub duration_secs: f64,
}

/// Aggregate result of `sync_all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    /// Per-stream results in execution order.
    pub streams: Vec<StreamSummary>,
    pub duration_secs: f64,
}

impl SyncSummary {
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.streams.iter().map(|s| s.records_read).sum()
    }

    #[must_use]
    pub fn records_emitted(&self) -> u64 {
        self.streams.iter().map(|s| s.records_emitted).sum()
    }

    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamSummary> {
        self.streams.iter().find(|s| s.stream == name)
    }
}
