//! Domain types for the component dependency graph.
//!
//! A module is identified by an opaque string token. Dependency signals are
//! directed: the *dependent* requires the *dependency* to be available first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a module.
///
/// Two identifiers are equal only when their bytes are identical; no case
/// folding or trimming is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Create a new module ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a dependency signal came from.
///
/// Provenance is carried for diagnostics only. Explicit and inferred signals
/// produce identical edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Declared by the module itself (metadata, manifest entry)
    #[default]
    Explicit,

    /// Derived by a host-side heuristic
    Inferred,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Inferred => write!(f, "inferred"),
        }
    }
}

/// A dependency as reported by a signal provider for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySignal {
    /// The module depended upon
    #[serde(rename = "id")]
    pub dependency: ModuleId,

    /// Explicit declaration or inferred hint
    #[serde(default)]
    pub provenance: Provenance,

    /// Optional confidence weight in `[0.0, 1.0]`, diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl DependencySignal {
    /// An explicit dependency with no confidence weight.
    pub fn explicit(dependency: impl Into<ModuleId>) -> Self {
        Self {
            dependency: dependency.into(),
            provenance: Provenance::Explicit,
            confidence: None,
        }
    }

    /// An inferred dependency with the given confidence.
    pub fn inferred(dependency: impl Into<ModuleId>, confidence: f32) -> Self {
        Self {
            dependency: dependency.into(),
            provenance: Provenance::Inferred,
            confidence: Some(confidence),
        }
    }
}

/// A fully qualified signal: `dependent -> dependency`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// The module that has the dependency
    pub dependent: ModuleId,

    /// The module being depended upon
    pub dependency: ModuleId,

    /// Explicit declaration or inferred hint
    pub provenance: Provenance,

    /// Optional confidence weight, diagnostics only
    pub confidence: Option<f32>,
}

impl Signal {
    /// Create an explicit signal stating that `dependent` requires `dependency`.
    pub fn new(dependent: impl Into<ModuleId>, dependency: impl Into<ModuleId>) -> Self {
        Self {
            dependent: dependent.into(),
            dependency: dependency.into(),
            provenance: Provenance::Explicit,
            confidence: None,
        }
    }

    /// Set the provenance of this signal.
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Set the confidence weight of this signal.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach a provider-level signal to its dependent.
    pub fn from_dependency(dependent: ModuleId, signal: DependencySignal) -> Self {
        Self {
            dependent,
            dependency: signal.dependency,
            provenance: signal.provenance,
            confidence: signal.confidence,
        }
    }
}
