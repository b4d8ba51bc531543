//! Modgraph CLI binary.

use anyhow::Result;
use modgraph::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the modgraph CLI.
///
/// The current-thread runtime is enough: the scheduler is a single worker and
/// the one-shot commands are sequential.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Example: RUST_LOG=modgraph=debug modgraph analyze --manifest modules.jsonl
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modgraph=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Starting modgraph CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Modgraph CLI completed successfully");
    Ok(())
}
