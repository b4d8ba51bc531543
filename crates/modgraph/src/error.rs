//! Error types for the dependency graph engine.

use crate::domain::ModuleId;
use std::io;
use thiserror::Error;

/// The error type for engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A query referenced a module absent from the current snapshot.
    #[error("Module not found: {0}")]
    NotFound(ModuleId),

    /// The signal provider failed or timed out during a rebuild.
    #[error("Signal provider unavailable: {0}")]
    SignalProviderUnavailable(String),

    /// Forward and reverse adjacency disagree.
    ///
    /// This indicates a graph builder bug. The rebuild that produced the graph
    /// is abandoned and the previous snapshot stays current.
    #[error("Graph invariant violated at {node}: {detail}")]
    GraphInvariantViolation {
        /// The node whose adjacency entries disagree
        node: ModuleId,
        /// Which mirror entry is missing
        detail: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The scheduler has already shut down.
    #[error("Scheduler is shut down")]
    Shutdown,

    /// The background worker panicked or was aborted.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error reports a builder bug rather than an outage.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::GraphInvariantViolation { .. })
    }
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
