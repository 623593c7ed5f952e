use std::io::{self, Write};

use anyhow::Result;
use streamtap_sdk::definition::TapDefinition;
use streamtap_sdk::tap::Tap;

use super::load_inputs;
use crate::RunInputs;

/// Execute the `--discover` action: print the catalog to stdout.
///
/// # Errors
///
/// Fails when config is invalid or the tap cannot discover streams.
pub fn execute<D: TapDefinition>(definition: &D, inputs: RunInputs) -> Result<String> {
    execute_to(definition, inputs, io::stdout())
}

/// Like [`execute`], writing the catalog to `out`.
///
/// # Errors
///
/// See [`execute`].
pub fn execute_to<D: TapDefinition, W: Write>(
    definition: &D,
    inputs: RunInputs,
    out: W,
) -> Result<String> {
    // 1. Load and validate config
    let loaded = load_inputs(definition, &inputs)?;

    // 2. Describe streams and apply any input catalog selection
    let streams = definition.discover_streams(&loaded.config)?;
    let mut tap = Tap::builder(definition.info())
        .config(loaded.config)
        .catalog(loaded.catalog)
        .streams(streams)
        .output(out)
        .build()?;

    // 3. Print the catalog
    Ok(tap.run_discovery()?)
}
