pub mod about;
pub mod discover;
pub mod sync;

use anyhow::{Context, Result};
use streamtap_sdk::config::{Input, TapConfig};
use streamtap_sdk::definition::TapDefinition;
use streamtap_sdk::state::{JsonFileStateStore, StateStore};
use streamtap_sdk::types::bookmark::BookmarkState;
use streamtap_sdk::types::catalog::Catalog;

use crate::RunInputs;

/// Config, catalog and starting state after loading and validation.
pub(crate) struct Loaded {
    pub config: TapConfig,
    pub catalog: Option<Catalog>,
    pub state: BookmarkState,
}

pub(crate) fn load_inputs<D: TapDefinition>(definition: &D, inputs: &RunInputs) -> Result<Loaded> {
    let config = TapConfig::load(inputs.config.clone()).context("Failed to load tap config")?;
    definition.validate_config(&config)?;

    let catalog = inputs
        .catalog
        .clone()
        .map(Input::load)
        .transpose()
        .context("Failed to load catalog")?;

    // A state path that does not exist yet is a first run.
    let state = match inputs.state.clone() {
        None => BookmarkState::new(),
        Some(Input::Inline(state)) => state,
        Some(Input::Path(path)) => JsonFileStateStore::new(&path)
            .load()
            .with_context(|| format!("Failed to load state from {}", path.display()))?
            .unwrap_or_default(),
    };

    Ok(Loaded {
        config,
        catalog,
        state,
    })
}
