//! Command-line surface shared by streamtap connectors.
//!
//! A connector's `main` hands its [`TapDefinition`] to [`main`]; flags are
//! parsed into an [`Action`] and dispatched to the matching command.

pub mod commands;
pub mod logging;

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde_json::Value;
use streamtap_sdk::config::Input;
use streamtap_sdk::definition::TapDefinition;
use streamtap_sdk::types::bookmark::BookmarkState;
use streamtap_sdk::types::catalog::Catalog;

/// Output format for `--about`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AboutFormat {
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Print the tap name and version
    #[arg(long)]
    pub version: bool,

    /// Print tap capabilities and settings
    #[arg(long)]
    pub about: bool,

    /// Format for --about
    #[arg(long, value_enum, default_value_t = AboutFormat::Json)]
    pub format: AboutFormat,

    /// Run discovery and print the catalog
    #[arg(long)]
    pub discover: bool,

    /// Path to the tap config (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to an input catalog selecting streams and fields
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Path to a bookmark state file to resume from
    #[arg(long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Persist every state checkpoint to this file
    #[arg(long, value_name = "PATH")]
    pub state_output: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// What the tap was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Version,
    About(AboutFormat),
    Discover,
    Sync,
}

impl Cli {
    /// Resolve flags into an action. Earlier rows win; no flag means sync.
    #[must_use]
    pub fn action(&self) -> Action {
        let table = [
            (self.version, Action::Version),
            (self.about, Action::About(self.format)),
            (self.discover, Action::Discover),
        ];
        table
            .into_iter()
            .find_map(|(set, action)| set.then_some(action))
            .unwrap_or(Action::Sync)
    }

    /// Config, catalog and state inputs named by the flags.
    #[must_use]
    pub fn inputs(&self) -> RunInputs {
        RunInputs {
            config: self
                .config
                .clone()
                .map_or(Input::Inline(Value::Null), Input::Path),
            catalog: self.catalog.clone().map(Input::Path),
            state: self.state.clone().map(Input::Path),
            state_output: self.state_output.clone(),
        }
    }
}

/// Documents a run consumes, by path or in memory.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub config: Input<Value>,
    pub catalog: Option<Input<Catalog>>,
    pub state: Option<Input<BookmarkState>>,
    pub state_output: Option<PathBuf>,
}

impl Default for RunInputs {
    fn default() -> Self {
        Self {
            config: Input::Inline(Value::Null),
            catalog: None,
            state: None,
            state_output: None,
        }
    }
}

/// Parse process arguments, labelling help output with the tap's name.
#[must_use]
pub fn parse_args<D: TapDefinition>(definition: &D) -> Cli {
    let info = definition.info();
    let matches = Cli::command()
        .bin_name(info.name)
        .about(info.description)
        .get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

/// Execute `action` for `definition`.
///
/// # Errors
///
/// Returns any configuration, discovery or sync error.
pub async fn run<D: TapDefinition>(
    definition: &D,
    action: Action,
    inputs: RunInputs,
) -> anyhow::Result<()> {
    match action {
        Action::Version => {
            println!("{}", definition.info().version_line());
            Ok(())
        }
        Action::About(format) => commands::about::execute(definition, format),
        Action::Discover => commands::discover::execute(definition, inputs).map(|_| ()),
        Action::Sync => commands::sync::execute(definition, inputs).await.map(|_| ()),
    }
}

/// Full connector entry point: parse flags, set up logging, dispatch.
///
/// # Errors
///
/// Propagates the command's error so the process exits non-zero.
pub async fn main<D: TapDefinition>(definition: D) -> anyhow::Result<()> {
    let cli = parse_args(&definition);
    logging::init(&cli.log_level);
    let action = cli.action();
    run(&definition, action, cli.inputs()).await
}
