//! CLI argument structs for all commands.

use clap::Parser;
use std::path::PathBuf;

/// Validate a module identifier given on the command line.
///
/// Identifiers are opaque, but an empty or whitespace-only one can never
/// match a module.
pub fn validate_module_id(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Module identifier cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

/// Manifest location shared by every command.
#[derive(Parser, Debug, Clone)]
pub struct ManifestArg {
    /// JSONL manifest describing modules and their dependencies
    #[arg(short, long, value_name = "FILE")]
    pub manifest: PathBuf,
}

/// Arguments for the `analyze` command
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Where the modules come from
    #[command(flatten)]
    pub source: ManifestArg,

    /// Number of critical modules to show (defaults to `critical-path-top-k`)
    #[arg(short, long)]
    pub top: Option<usize>,
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Module whose blast radius to compute
    #[arg(value_parser = validate_module_id)]
    pub module: String,

    /// Where the modules come from
    #[command(flatten)]
    pub source: ManifestArg,
}

/// Arguments for the `deps` command
#[derive(Parser, Debug, Clone)]
pub struct DepsArgs {
    /// Module whose direct relationships to show
    #[arg(value_parser = validate_module_id)]
    pub module: String,

    /// Where the modules come from
    #[command(flatten)]
    pub source: ManifestArg,
}

/// Arguments for the `watch` command
#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    /// Where the modules come from
    #[command(flatten)]
    pub source: ManifestArg,

    /// Override the snapshot file from the configuration
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("music", "music")]
    #[case("  voice ", "voice")]
    #[case("core.utils", "core.utils")]
    fn module_id_is_trimmed(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_module_id(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn empty_module_id_is_rejected(#[case] input: &str) {
        assert!(validate_module_id(input).is_err());
    }
}
