//! Sync orchestrator.
//!
//! A [`Tap`] is built once per run by [`TapBuilder::build`], which validates
//! the stream declarations, resolves the catalog and fixes the execution
//! order. It owns the [`BookmarkState`] for the run and writes protocol
//! messages to its output sink.
//!
//! Per stream: `PENDING -> ENUMERATING_SUBSTREAMS -> SYNCING_SUBSTREAM* ->
//! COMPLETED`, or `FAILED` on the first error. A failed stream keeps every
//! bookmark it committed before the failure.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;

use futures::TryStreamExt;
use streamtap_state::StateStore;
use streamtap_types::bookmark::BookmarkState;
use streamtap_types::catalog::Catalog;
use streamtap_types::message::Message;
use streamtap_types::plugin::PluginInfo;
use streamtap_types::substream::SubstreamId;
use streamtap_types::TapError;

use crate::bookmarks;
use crate::catalog::{build_catalog, resolve, EffectiveStream};
use crate::config::TapConfig;
use crate::definition::StreamSet;
use crate::ordering::topo_order;
use crate::output::MessageWriter;
use crate::stream::{RecordContext, TapStream};
use crate::summary::{StreamSummary, SyncSummary};

/// Lifecycle phase of a stream within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPhase {
    Pending,
    EnumeratingSubstreams,
    SyncingSubstream,
    Completed,
    Failed,
}

impl std::fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::EnumeratingSubstreams => "ENUMERATING_SUBSTREAMS",
            Self::SyncingSubstream => "SYNCING_SUBSTREAM",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects everything a [`Tap`] needs for one run.
pub struct TapBuilder<W: Write> {
    info: PluginInfo,
    config: TapConfig,
    catalog: Option<Catalog>,
    state: Option<BookmarkState>,
    store: Option<Box<dyn StateStore>>,
    streams: StreamSet,
    output: W,
}

impl TapBuilder<io::Stdout> {
    /// Builder writing to stdout.
    #[must_use]
    pub fn new(info: PluginInfo) -> Self {
        Self {
            info,
            config: TapConfig::new(),
            catalog: None,
            state: None,
            store: None,
            streams: Vec::new(),
            output: io::stdout(),
        }
    }
}

impl<W: Write> TapBuilder<W> {
    #[must_use]
    pub fn config(mut self, config: TapConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn catalog(mut self, catalog: Option<Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Starting state. Takes precedence over a state store's saved state.
    #[must_use]
    pub fn state(mut self, state: BookmarkState) -> Self {
        self.state = Some(state);
        self
    }

    /// Store to load the starting state from and to save checkpoints to.
    #[must_use]
    pub fn state_store(mut self, store: impl StateStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    #[must_use]
    pub fn stream(mut self, stream: impl TapStream + 'static) -> Self {
        self.streams.push(Box::new(stream));
        self
    }

    #[must_use]
    pub fn streams(mut self, streams: StreamSet) -> Self {
        self.streams.extend(streams);
        self
    }

    /// Redirect protocol output.
    pub fn output<W2: Write>(self, output: W2) -> TapBuilder<W2> {
        TapBuilder {
            info: self.info,
            config: self.config,
            catalog: self.catalog,
            state: self.state,
            store: self.store,
            streams: self.streams,
            output,
        }
    }

    /// Validate declarations, resolve the catalog and order the streams.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configuration`] for invalid or duplicate stream
    /// declarations, unknown parents and dependency cycles, and
    /// [`TapError::StateStore`] when the store cannot be read.
    pub fn build(self) -> Result<Tap<W>, TapError> {
        let mut index = HashMap::with_capacity(self.streams.len());
        for (i, stream) in self.streams.iter().enumerate() {
            let descriptor = stream.descriptor();
            descriptor.validate()?;
            if index.insert(descriptor.name.clone(), i).is_some() {
                return Err(TapError::config(format!(
                    "stream '{}' is declared more than once",
                    descriptor.name
                )));
            }
        }

        let descriptors: Vec<_> = self.streams.iter().map(|s| s.descriptor().clone()).collect();
        let order = topo_order(&descriptors)?;

        if let Some(catalog) = &self.catalog {
            for entry in &catalog.streams {
                if !index.contains_key(&entry.tap_stream_id) {
                    tracing::warn!(
                        stream = entry.tap_stream_id,
                        "Catalog entry does not match any stream, ignoring"
                    );
                }
            }
        }
        let resolved: Vec<EffectiveStream> = descriptors
            .iter()
            .map(|d| resolve(d, self.catalog.as_ref()))
            .collect();

        // Children come after parents in `order`, so walking it backwards
        // sees every dependent before its parents.
        let mut active: Vec<bool> = resolved.iter().map(|s| s.selected).collect();
        for &i in order.iter().rev() {
            if active[i] {
                for parent in &descriptors[i].parent_streams {
                    active[index[parent]] = true;
                }
            }
        }

        let state = match (self.state, &self.store) {
            (Some(state), _) => state,
            (None, Some(store)) => store
                .load()
                .map_err(|e| TapError::StateStore(Box::new(e)))?
                .unwrap_or_default(),
            (None, None) => BookmarkState::new(),
        };

        tracing::debug!(
            tap = self.info.name,
            streams = resolved.len(),
            selected = resolved.iter().filter(|s| s.selected).count(),
            "Tap initialized"
        );

        let phases = vec![StreamPhase::Pending; self.streams.len()];
        let schema_sent = vec![false; self.streams.len()];
        Ok(Tap {
            info: self.info,
            config: self.config,
            streams: self.streams,
            resolved,
            order,
            active,
            index,
            state,
            store: self.store,
            writer: MessageWriter::new(self.output),
            phases,
            schema_sent,
        })
    }
}

// ---------------------------------------------------------------------------
// Tap
// ---------------------------------------------------------------------------

/// Orchestrator for one tap run.
pub struct Tap<W: Write> {
    info: PluginInfo,
    config: TapConfig,
    streams: StreamSet,
    resolved: Vec<EffectiveStream>,
    order: Vec<usize>,
    active: Vec<bool>,
    index: HashMap<String, usize>,
    state: BookmarkState,
    store: Option<Box<dyn StateStore>>,
    writer: MessageWriter<W>,
    phases: Vec<StreamPhase>,
    schema_sent: Vec<bool>,
}

impl Tap<io::Stdout> {
    /// Shorthand for [`TapBuilder::new`].
    #[must_use]
    pub fn builder(info: PluginInfo) -> TapBuilder<io::Stdout> {
        TapBuilder::new(info)
    }
}

impl<W: Write> Tap<W> {
    #[must_use]
    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    #[must_use]
    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &BookmarkState {
        &self.state
    }

    /// Resolved streams in execution order.
    pub fn effective_streams(&self) -> impl Iterator<Item = &EffectiveStream> {
        self.order.iter().map(|&i| &self.resolved[i])
    }

    /// Current phase of `stream`, if it exists.
    #[must_use]
    pub fn phase(&self, stream: &str) -> Option<StreamPhase> {
        self.index.get(stream).map(|&i| self.phases[i])
    }

    /// Discovery catalog for the resolved streams, in declaration order.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        build_catalog(&self.resolved)
    }

    /// Print the discovery catalog as pretty JSON and return it.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Serialization`] or [`TapError::Io`].
    pub fn run_discovery(&mut self) -> Result<String, TapError> {
        let json = serde_json::to_string_pretty(&self.catalog())?;
        self.writer.write_raw(&json)?;
        self.writer.flush()?;
        tracing::info!(streams = self.resolved.len(), "Discovery complete");
        Ok(json)
    }

    /// Emit the current state as a STATE message and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Io`] on write failure and
    /// [`TapError::StateStore`] when the store rejects the save.
    pub fn checkpoint(&mut self) -> Result<(), TapError> {
        self.writer.write(&Message::State {
            value: self.state.clone(),
        })?;
        self.writer.flush()?;
        if let Some(store) = &self.store {
            store
                .save(&self.state)
                .map_err(|e| TapError::StateStore(Box::new(e)))?;
        }
        tracing::info!(streams = self.state.bookmarks.len(), "State checkpoint emitted");
        Ok(())
    }

    /// Sync every active stream, parents before children.
    ///
    /// Deselected streams run silently when a selected stream depends on
    /// them; other deselected streams are skipped.
    ///
    /// # Errors
    ///
    /// The first stream error aborts the run.
    pub async fn sync_all(&mut self) -> Result<SyncSummary, TapError> {
        let start = Instant::now();
        tracing::info!(tap = self.info.name, streams = self.order.len(), "Starting sync");

        let mut summary = SyncSummary::default();
        for idx in self.order.clone() {
            if !self.active[idx] {
                tracing::info!(stream = self.resolved[idx].name(), "Stream not selected, skipping");
                continue;
            }
            summary.streams.push(self.sync_stream(idx).await?);
        }
        if summary.streams.is_empty() {
            self.checkpoint()?;
        }

        summary.duration_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            tap = self.info.name,
            streams = summary.streams.len(),
            records = summary.records_emitted(),
            duration_secs = summary.duration_secs,
            "Sync complete"
        );
        Ok(summary)
    }

    /// Sync exactly one stream.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::StreamNotFound`] for an unknown name and
    /// [`TapError::DependencyState`] when a parent has not completed in this
    /// run.
    pub async fn sync_one(&mut self, name: &str) -> Result<StreamSummary, TapError> {
        let Some(&idx) = self.index.get(name) else {
            return Err(TapError::stream_not_found(name, self.index.keys().cloned()));
        };
        self.sync_stream(idx).await
    }

    /// Consume the tap, returning the output sink.
    pub fn into_output(self) -> W {
        self.writer.into_inner()
    }

    fn set_phase(&mut self, idx: usize, phase: StreamPhase) {
        self.phases[idx] = phase;
        tracing::debug!(stream = self.resolved[idx].name(), phase = %phase, "Stream phase changed");
    }

    async fn sync_stream(&mut self, idx: usize) -> Result<StreamSummary, TapError> {
        let name = self.resolved[idx].name().to_string();

        let descriptor = &self.resolved[idx].descriptor;
        if descriptor.is_dependent() {
            let unfinished = descriptor
                .parent_streams
                .iter()
                .find(|p| self.phases[self.index[p.as_str()]] != StreamPhase::Completed)
                .cloned();
            if let Some(parent) = unfinished {
                self.set_phase(idx, StreamPhase::Failed);
                return Err(TapError::dependency(
                    name,
                    format!("parent stream '{parent}' has not completed in this run"),
                ));
            }
        }

        let emit = self.resolved[idx].selected;
        tracing::info!(stream = name, silent = !emit, "Syncing stream");

        match self.run_stream(idx, &name, emit).await {
            Ok(summary) => {
                self.set_phase(idx, StreamPhase::Completed);
                tracing::info!(
                    stream = name,
                    substreams = summary.substreams,
                    records = summary.records_read,
                    duration_secs = summary.duration_secs,
                    "Stream complete"
                );
                self.checkpoint()?;
                Ok(summary)
            }
            Err(e) => {
                self.set_phase(idx, StreamPhase::Failed);
                tracing::error!(stream = name, "Stream failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_stream(
        &mut self,
        idx: usize,
        name: &str,
        emit: bool,
    ) -> Result<StreamSummary, TapError> {
        let start = Instant::now();
        let mut summary = StreamSummary {
            stream: name.to_string(),
            ..StreamSummary::default()
        };

        if emit && !self.schema_sent[idx] {
            self.writer.write(&self.resolved[idx].schema_message())?;
            self.schema_sent[idx] = true;
        }

        self.set_phase(idx, StreamPhase::EnumeratingSubstreams);
        let passes: Vec<Option<SubstreamId>> =
            match self.streams[idx].substreams(&self.config, &self.state)? {
                None => vec![None],
                Some(ids) => ids.into_iter().map(Some).collect(),
            };
        if passes.is_empty() {
            tracing::info!(stream = name, "No substreams to sync");
        }

        for substream in &passes {
            self.set_phase(idx, StreamPhase::SyncingSubstream);

            let Self {
                config,
                streams,
                resolved,
                state,
                writer,
                ..
            } = &mut *self;
            let stream = streams[idx].as_ref();
            let effective = &resolved[idx];
            let substream = substream.as_ref();

            let params = stream.params(substream, config, state)?;
            tracing::debug!(
                stream = name,
                substream = substream.map(SubstreamId::as_str),
                params = %serde_json::Value::Object(params.clone()),
                "Syncing substream"
            );

            let mut records = stream.records(&params);
            while let Some(record) = records.try_next().await? {
                summary.records_read += 1;
                // Silent parents keep every field for their hooks.
                let record = if emit {
                    effective.fields.project(record)
                } else {
                    record
                };

                let mut ctx = RecordContext::new(name, substream, &params, config, state);
                let Some(record) = stream.post_process(record, &mut ctx)? else {
                    continue;
                };

                bookmarks::update_bookmark(state, &effective.descriptor, substream, &record)?;
                if emit {
                    writer.write(&Message::Record {
                        stream: name.to_string(),
                        record,
                    })?;
                    summary.records_emitted += 1;
                }
            }
            summary.substreams += 1;
        }

        summary.duration_secs = start.elapsed().as_secs_f64();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, BoxStream, StreamExt};
    use serde_json::json;
    use streamtap_types::stream::{Params, Record, StreamDescriptor};

    struct Fixed {
        descriptor: StreamDescriptor,
        rows: Vec<Record>,
    }

    impl Fixed {
        fn new(name: &str, rows: Vec<serde_json::Value>) -> Self {
            Self {
                descriptor: StreamDescriptor::new(
                    name,
                    json!({"type": "object", "properties": {"id": {"type": "integer"}}}),
                )
                .primary_keys(["id"]),
                rows: rows
                    .into_iter()
                    .map(|r| r.as_object().unwrap().clone())
                    .collect(),
            }
        }
    }

    impl TapStream for Fixed {
        fn descriptor(&self) -> &StreamDescriptor {
            &self.descriptor
        }

        fn records<'a>(&'a self, _params: &'a Params) -> BoxStream<'a, Result<Record, TapError>> {
            stream::iter(self.rows.clone().into_iter().map(Ok)).boxed()
        }
    }

    fn info() -> PluginInfo {
        PluginInfo::new("tap-test", "0.0.1")
    }

    #[test]
    fn duplicate_stream_names_rejected() {
        let err = TapBuilder::new(info())
            .stream(Fixed::new("a", vec![]))
            .stream(Fixed::new("a", vec![]))
            .output(Vec::new())
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn phases_start_pending() {
        let tap = TapBuilder::new(info())
            .stream(Fixed::new("a", vec![]))
            .output(Vec::new())
            .build()
            .unwrap();
        assert_eq!(tap.phase("a"), Some(StreamPhase::Pending));
        assert_eq!(tap.phase("b"), None);
    }

    #[tokio::test]
    async fn sync_one_unknown_stream() {
        let mut tap = TapBuilder::new(info())
            .stream(Fixed::new("projects", vec![]))
            .stream(Fixed::new("issues", vec![]))
            .output(Vec::new())
            .build()
            .unwrap();
        let err = tap.sync_one("epics").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Could not find stream 'epics' in streams list: ["issues", "projects"]"#
        );
    }

    #[tokio::test]
    async fn schema_then_records_then_state() {
        let mut tap = TapBuilder::new(info())
            .stream(Fixed::new("projects", vec![json!({"id": 1}), json!({"id": 2})]))
            .output(Vec::new())
            .build()
            .unwrap();
        let summary = tap.sync_all().await.unwrap();
        assert_eq!(summary.records_emitted(), 2);
        assert_eq!(tap.phase("projects"), Some(StreamPhase::Completed));

        let out = String::from_utf8(tap.into_output()).unwrap();
        let types: Vec<String> = out
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types, vec!["SCHEMA", "RECORD", "RECORD", "STATE"]);
    }

    #[tokio::test]
    async fn empty_run_still_checkpoints() {
        let mut tap = TapBuilder::new(info()).output(Vec::new()).build().unwrap();
        tap.sync_all().await.unwrap();
        let out = String::from_utf8(tap.into_output()).unwrap();
        assert_eq!(out, "{\"type\":\"STATE\",\"value\":{\"bookmarks\":{}}}\n");
    }

    #[test]
    fn phase_display_is_screaming_case() {
        assert_eq!(StreamPhase::EnumeratingSubstreams.to_string(), "ENUMERATING_SUBSTREAMS");
    }
}
