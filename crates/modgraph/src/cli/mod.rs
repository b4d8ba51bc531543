//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `analyze`: Build the graph once and print load order, cycles, and critical path
//! - `impact`: Show every module affected by a change to one module
//! - `deps`: Show a module's direct dependencies and dependents
//! - `watch`: Keep rebuilding on a timer until Ctrl-C
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--config`: YAML engine configuration
//!
//! # Example
//!
//! ```bash
//! modgraph analyze --manifest modules.jsonl --top 5
//! modgraph impact voice --manifest modules.jsonl
//! modgraph --config engine.yaml watch --manifest modules.jsonl
//! ```

mod args;
mod execute;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{AnalyzeArgs, DepsArgs, ImpactArgs, ManifestArg, WatchArgs, validate_module_id};

/// Modgraph - component dependency graph engine
///
/// Detects dependency cycles between pluggable modules and derives a safe
/// load order, the most critical modules, and the blast radius of a change.
#[derive(Parser, Debug)]
#[command(name = "modgraph")]
#[command(version, about, propagate_version = true)]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Engine configuration file (YAML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// What to do
    #[command(subcommand)]
    pub command: Commands,
}

/// `modgraph` subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Analyze a manifest once
    ///
    /// Prints the safe load order, every dependency cycle, and the most
    /// critical modules.
    Analyze(AnalyzeArgs),

    /// Show the blast radius of a module
    ///
    /// Lists every module that depends on the given one, directly or
    /// transitively. An unknown module has an empty blast radius.
    Impact(ImpactArgs),

    /// Show direct dependencies and dependents of a module
    Deps(DepsArgs),

    /// Rebuild continuously until interrupted
    ///
    /// Re-reads the manifest every `refresh-interval-ms` and persists each
    /// published snapshot when a snapshot file is configured.
    Watch(WatchArgs),
}

impl Cli {
    /// Parse `std::env::args`, exiting on error.
    #[must_use]
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the manifest cannot
    /// be read, or output cannot be written.
    pub async fn execute(&self) -> Result<()> {
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let config = execute::load_config(self.config.as_deref()).await?;

        match &self.command {
            Commands::Analyze(args) => execute::execute_analyze(args, &config, output_mode).await,
            Commands::Impact(args) => execute::execute_impact(args, &config, output_mode).await,
            Commands::Deps(args) => execute::execute_deps(args, &config, output_mode).await,
            Commands::Watch(args) => execute::execute_watch(args, config, output_mode).await,
        }
    }
}
