//! Command execution logic.
//!
//! One-shot commands (`analyze`, `impact`, `deps`) run a single rebuild
//! directly. `watch` starts a full [`DependencyEngine`].

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use super::args::{AnalyzeArgs, DepsArgs, ImpactArgs, WatchArgs};
use crate::config::EngineConfig;
use crate::domain::ModuleId;
use crate::engine::DependencyEngine;
use crate::error::Error;
use crate::output::{
    self, DepsReport, ImpactReport, OutputConfig, OutputMode, write_analysis, write_deps,
    write_impact, write_json, write_manifest_warnings,
};
use crate::signals::{ManifestSignalProvider, gather_graph};
use crate::snapshot::{AnalysisOptions, FileSnapshotStore, Snapshot, SnapshotStore};

/// Load and validate the configuration, falling back to defaults.
pub async fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Run one rebuild against a manifest and report skipped lines on stderr.
async fn analyze_manifest(manifest: &Path, config: &EngineConfig, options: &AnalysisOptions) -> Result<Snapshot> {
    let provider = ManifestSignalProvider::new(manifest);
    let (graph, stats) = tokio::time::timeout(config.provider_timeout(), gather_graph(&provider))
        .await
        .map_err(|_| {
            Error::SignalProviderUnavailable(format!(
                "no answer within {}ms",
                config.provider_timeout_ms
            ))
        })??;

    let warnings = provider.warnings().await;
    if !warnings.is_empty() {
        write_manifest_warnings(&mut io::stderr().lock(), &warnings, &OutputConfig::from_env())?;
    }

    let snapshot = Snapshot::compute(graph, stats, options)?;
    tracing::debug!(
        modules = snapshot.graph().node_count(),
        cycles = snapshot.cycles().len(),
        "Analysis complete"
    );
    Ok(snapshot)
}

/// Execute the analyze command
pub async fn execute_analyze(
    args: &AnalyzeArgs,
    config: &EngineConfig,
    output_mode: OutputMode,
) -> Result<()> {
    let mut options = AnalysisOptions::from(config);
    if let Some(top) = args.top {
        options.critical_path_top_k = top;
    }

    let snapshot = analyze_manifest(&args.source.manifest, config, &options).await?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match output_mode {
        OutputMode::Json => write_json(&mut handle, &snapshot.to_record())?,
        OutputMode::Text => write_analysis(
            &mut handle,
            &snapshot,
            options.critical_path_top_k,
            &OutputConfig::from_env(),
        )?,
    }
    Ok(())
}

/// Execute the impact command
pub async fn execute_impact(
    args: &ImpactArgs,
    config: &EngineConfig,
    output_mode: OutputMode,
) -> Result<()> {
    let snapshot =
        analyze_manifest(&args.source.manifest, config, &AnalysisOptions::from(config)).await?;

    let module = ModuleId::from(args.module.as_str());
    let impact = snapshot.impact(&module);
    let report = ImpactReport {
        module: &module,
        found: snapshot.graph().contains(&module),
        impact: &impact,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match output_mode {
        OutputMode::Json => write_json(&mut handle, &report)?,
        OutputMode::Text => write_impact(&mut handle, &report, &OutputConfig::from_env())?,
    }
    Ok(())
}

/// Execute the deps command
pub async fn execute_deps(
    args: &DepsArgs,
    config: &EngineConfig,
    output_mode: OutputMode,
) -> Result<()> {
    let snapshot =
        analyze_manifest(&args.source.manifest, config, &AnalysisOptions::from(config)).await?;

    let module = ModuleId::from(args.module.as_str());
    let (found, dependencies, dependents) = match snapshot.dependencies(&module) {
        Ok(dependencies) => (true, dependencies, snapshot.dependents(&module)?),
        Err(Error::NotFound(_)) => (false, Vec::new(), Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let report = DepsReport {
        module: &module,
        found,
        dependencies: &dependencies,
        dependents: &dependents,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match output_mode {
        OutputMode::Json => write_json(&mut handle, &report)?,
        OutputMode::Text => write_deps(&mut handle, &report, &OutputConfig::from_env())?,
    }
    Ok(())
}

/// Execute the watch command
///
/// Runs the scheduler until Ctrl-C, reporting every publication and every
/// failed rebuild, then shuts down with the configured grace period.
pub async fn execute_watch(
    args: &WatchArgs,
    config: EngineConfig,
    output_mode: OutputMode,
) -> Result<()> {
    let output_config = OutputConfig::from_env();
    // `snapshot_path` from the config is the engine's fallback.
    let store: Option<Arc<dyn SnapshotStore>> = args
        .snapshot
        .clone()
        .map(|path| Arc::new(FileSnapshotStore::new(path)) as Arc<dyn SnapshotStore>);
    let provider = Arc::new(ManifestSignalProvider::new(&args.source.manifest));

    let engine = DependencyEngine::start(provider, store, config).await?;
    let mut status = engine.subscribe();
    let mut last_generation = engine.status().generation;
    let mut last_failures = 0;

    eprintln!(
        "{}",
        output::info(
            &format!(
                "Watching {} (Ctrl-C to stop)",
                args.source.manifest.display()
            ),
            &output_config
        )
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();

                if current.generation > last_generation {
                    last_generation = current.generation;
                    report_publication(&engine.snapshot(), output_mode, &output_config)?;
                } else if current.consecutive_failures > last_failures {
                    let reason = current.last_error.as_deref().unwrap_or("unknown error");
                    eprintln!(
                        "{}",
                        output::error(
                            &format!("Rebuild failed ({} in a row): {reason}", current.consecutive_failures),
                            &output_config
                        )
                    );
                }
                last_failures = current.consecutive_failures;

                if current.stopped {
                    break;
                }
            }
        }
    }

    engine.shutdown().await?;
    eprintln!("{}", output::success("Stopped", &output_config));
    Ok(())
}

fn report_publication(
    snapshot: &Snapshot,
    output_mode: OutputMode,
    config: &OutputConfig,
) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match output_mode {
        OutputMode::Json => {
            // One record per line so the stream stays line-delimited.
            serde_json::to_writer(&mut handle, &snapshot.to_record())?;
            writeln!(handle)?;
        }
        OutputMode::Text => {
            let line = format!(
                "[generation {}] {} modules, {} edges, {} cycles{}",
                snapshot.generation(),
                snapshot.graph().node_count(),
                snapshot.graph().edge_count(),
                snapshot.cycles().len(),
                if snapshot.cycles_truncated() {
                    " (search truncated)"
                } else {
                    ""
                }
            );
            let styled = if snapshot.cycles().is_empty() {
                output::success(&line, config)
            } else {
                output::warning(&line, config)
            };
            writeln!(handle, "{styled}")?;
        }
    }
    handle.flush()?;
    Ok(())
}
