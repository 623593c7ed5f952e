use std::io::{self, BufWriter, Write};

use anyhow::Result;
use streamtap_sdk::definition::TapDefinition;
use streamtap_sdk::state::JsonFileStateStore;
use streamtap_sdk::summary::SyncSummary;
use streamtap_sdk::tap::Tap;

use super::load_inputs;
use crate::RunInputs;

/// Execute the default sync action: stream SCHEMA, RECORD and STATE lines to stdout.
///
/// # Errors
///
/// Fails on invalid inputs or the first stream error.
pub async fn execute<D: TapDefinition>(definition: &D, inputs: RunInputs) -> Result<SyncSummary> {
    execute_to(definition, inputs, BufWriter::new(io::stdout())).await
}

/// Like [`execute`], writing protocol messages to `out`.
///
/// # Errors
///
/// See [`execute`].
pub async fn execute_to<D: TapDefinition, W: Write>(
    definition: &D,
    inputs: RunInputs,
    out: W,
) -> Result<SyncSummary> {
    // 1. Load inputs
    let loaded = load_inputs(definition, &inputs)?;

    // 2. Build streams for this run
    let streams = definition.load_streams(&loaded.config, loaded.catalog.as_ref())?;

    // 3. Assemble the tap
    let mut builder = Tap::builder(definition.info())
        .config(loaded.config)
        .catalog(loaded.catalog)
        .state(loaded.state)
        .streams(streams);
    if let Some(path) = &inputs.state_output {
        builder = builder.state_store(JsonFileStateStore::new(path));
    }
    let mut tap = builder.output(out).build()?;

    // 4. Sync
    let summary = tap.sync_all().await?;
    tracing::info!(
        streams = summary.streams.len(),
        records_read = summary.records_read(),
        records_emitted = summary.records_emitted(),
        duration_secs = summary.duration_secs,
        "Sync complete"
    );
    Ok(summary)
}
