//! Output formatting for CLI commands.
//!
//! Every command can print human-readable text or JSON. Writers take any
//! `io::Write` so the formatting can be checked against a buffer.

pub mod color;

use crate::config::CriticalityPolicy;
use crate::domain::ModuleId;
use crate::signals::ManifestWarning;
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::collections::BTreeSet;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{bold, dimmed};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Configuration for text output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new `OutputConfig` with explicit values.
    #[must_use]
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Create an `OutputConfig` from the environment.
    ///
    /// Reads:
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `MODGRAPH_COLOR`: Set to "0" or "false" to disable colors (default: true)
    #[must_use]
    pub fn from_env() -> Self {
        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("MODGRAPH_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// JSON shape of the `impact` command.
#[derive(Debug, Serialize)]
pub struct ImpactReport<'a> {
    /// The queried module
    pub module: &'a ModuleId,
    /// Whether the module exists in the graph
    pub found: bool,
    /// Every transitive dependent
    pub impact: &'a BTreeSet<ModuleId>,
}

/// JSON shape of the `deps` command.
#[derive(Debug, Serialize)]
pub struct DepsReport<'a> {
    /// The queried module
    pub module: &'a ModuleId,
    /// Whether the module exists in the graph
    pub found: bool,
    /// Direct dependencies
    pub dependencies: &'a [ModuleId],
    /// Direct dependents
    pub dependents: &'a [ModuleId],
}

/// Write any serializable value as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)
}

/// Write the summary of a freshly analysed snapshot.
pub fn write_analysis<W: Write>(
    w: &mut W,
    snapshot: &Snapshot,
    top_k: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    let graph = snapshot.graph();
    let stats = snapshot.build_stats();

    writeln!(
        w,
        "{} {}",
        bold("Modules:", config),
        dimmed(
            &format!(
                "{} modules, {} edges, {} signals",
                graph.node_count(),
                graph.edge_count(),
                stats.signals_seen
            ),
            config
        )
    )?;
    if stats.self_loops_dropped > 0 {
        writeln!(
            w,
            "  {}",
            warning(
                &format!("{} self-dependencies ignored", stats.self_loops_dropped),
                config
            )
        )?;
    }

    writeln!(w)?;
    writeln!(w, "{}", bold("Load order:", config))?;
    for (position, id) in snapshot.load_order().iter().enumerate() {
        let marker = if snapshot.in_cycle(id) {
            format!(" {}", error("(cycle)", config))
        } else {
            String::new()
        };
        writeln!(w, "  {:>3}. {}{marker}", position + 1, info(id.as_str(), config))?;
    }

    writeln!(w)?;
    if snapshot.cycles().is_empty() && !snapshot.cycles_truncated() {
        writeln!(w, "{} {}", bold("Cycles:", config), success("none", config))?;
    } else {
        writeln!(w, "{} {}", bold("Cycles:", config), snapshot.cycles().len())?;
        for cycle in snapshot.cycles() {
            let walk: Vec<&str> = cycle.walk().iter().map(ModuleId::as_str).collect();
            writeln!(w, "  {}", error(&walk.join(" -> "), config))?;
        }
        if snapshot.cycles_truncated() {
            writeln!(
                w,
                "  {}",
                warning("Cycle search hit its budget; list may be incomplete", config)
            )?;
        }
    }

    writeln!(w)?;
    writeln!(w, "{}", bold("Critical path:", config))?;
    let unit = match snapshot.criticality() {
        CriticalityPolicy::Direct => "direct dependents",
        CriticalityPolicy::Transitive => "affected modules",
    };
    for (position, id) in snapshot.top_critical(top_k).iter().enumerate() {
        let score = snapshot.criticality_score(id);
        writeln!(
            w,
            "  {:>3}. {} {}",
            position + 1,
            info(id.as_str(), config),
            dimmed(&format!("({score} {unit})"), config)
        )?;
    }

    Ok(())
}

/// Write the result of an impact query.
pub fn write_impact<W: Write>(
    w: &mut W,
    report: &ImpactReport<'_>,
    config: &OutputConfig,
) -> io::Result<()> {
    if !report.found {
        writeln!(
            w,
            "{}",
            warning(&format!("Module not found: {}", report.module), config)
        )?;
    }

    if report.impact.is_empty() {
        writeln!(
            w,
            "Nothing depends on {}",
            info(report.module.as_str(), config)
        )?;
        return Ok(());
    }

    writeln!(
        w,
        "{} {} {}",
        bold("Impact of", config),
        info(report.module.as_str(), config),
        dimmed(&format!("({} modules)", report.impact.len()), config)
    )?;
    for id in report.impact {
        writeln!(w, "  {id}")?;
    }
    Ok(())
}

/// Write the result of a dependency query.
pub fn write_deps<W: Write>(
    w: &mut W,
    report: &DepsReport<'_>,
    config: &OutputConfig,
) -> io::Result<()> {
    if !report.found {
        writeln!(
            w,
            "{}",
            warning(&format!("Module not found: {}", report.module), config)
        )?;
        return Ok(());
    }

    writeln!(w, "{}", info(report.module.as_str(), config))?;
    write_id_list(w, "Depends on", report.dependencies, config)?;
    write_id_list(w, "Depended on by", report.dependents, config)
}

fn write_id_list<W: Write>(
    w: &mut W,
    title: &str,
    ids: &[ModuleId],
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "  {}", bold(&format!("{title}:"), config))?;
    if ids.is_empty() {
        writeln!(w, "    {}", dimmed("(none)", config))?;
    }
    for id in ids {
        writeln!(w, "    {id}")?;
    }
    Ok(())
}

/// Write manifest warnings, one per line.
pub fn write_manifest_warnings<W: Write>(
    w: &mut W,
    warnings: &[ManifestWarning],
    config: &OutputConfig,
) -> io::Result<()> {
    for item in warnings {
        let text = match item {
            ManifestWarning::MalformedJson { line_number, error } => {
                format!("Skipped manifest line {line_number}: {error}")
            }
            ManifestWarning::SkippedLine {
                line_number,
                reason,
            } => format!("Skipped manifest line {line_number}: {reason}"),
        };
        writeln!(w, "{}", warning(&text, config))?;
    }
    Ok(())
}
