//! Modgraph - component dependency graph engine.
//!
//! The engine observes the modules loaded by a host application, builds a
//! directed graph from the dependency signals they report, and derives:
//!
//! - every dependency cycle ([`graph::find_cycles`]),
//! - a safe load order ([`graph::load_order`]),
//! - the most critical modules ([`graph::rank`]),
//! - the blast radius of a change ([`graph::impact_of`]).
//!
//! Results are bundled into an immutable [`snapshot::Snapshot`] that a single
//! background [`scheduler::Scheduler`] rebuilds and publishes atomically. Hosts
//! talk to [`engine::DependencyEngine`].

#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod scheduler;
pub mod signals;
pub mod snapshot;

// Public CLI modules (needed by binary)
pub mod cli;
pub mod output;

pub use domain::{DependencySignal, ModuleId, Provenance, Signal};
pub use engine::DependencyEngine;
pub use error::{Error, Result};
