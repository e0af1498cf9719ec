//! Ripple Core
//!
//! This crate provides an explicit reactive computation graph. It implements:
//!
//! - Signals: named, externally mutable value cells
//! - Derivations: cached computations, recomputed lazily when an input changed
//! - Sinks: side-effecting consumers, re-run whenever a change reaches them
//! - A single-writer session that serializes events from concurrent sources
//!
//! The crate is designed to be used both as a native Rust library and, with
//! the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: node table, registration, cycle detection and invalidation
//! - `reactive`: node definitions, the evaluator and the sink runner
//! - `session`: tokio task owning a graph behind a command queue
//! - `snapshot`: serializable view of a graph for tooling
//! - `config`, `error`: configuration and error types
//!
//! # Example
//!
//! ```rust
//! use ripple_core::graph::Graph;
//! use ripple_core::reactive::{Derivation, Sink};
//!
//! let mut graph = Graph::new();
//! graph.add_signal("a", 2).unwrap();
//! graph.add_signal("b", 3).unwrap();
//!
//! // Create a derived value
//! graph
//!     .register(Derivation::infallible("sum", |v: &[i32]| v[0] + v[1]), ["a", "b"])
//!     .unwrap();
//!
//! // Create a sink
//! graph
//!     .register(Sink::infallible("print", |v: &[i32]| println!("sum = {}", v[0])), ["sum"])
//!     .unwrap();
//!
//! // Update a signal and re-run what it reached
//! let sinks = graph.set("a", 10).unwrap();
//! let outcomes = graph.run_all(&sinks);
//! // prints: "sum = 13"
//! assert!(outcomes.iter().all(|(_, outcome)| outcome.is_ok()));
//! assert_eq!(graph.get("sum").unwrap(), 13);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod session;
pub mod snapshot;

#[cfg(feature = "python")]
mod python;

pub use config::GraphConfig;
pub use error::{BoxError, ConfigError, GraphError, SinkError};
pub use graph::{Graph, NodeId, NodeKind};
pub use reactive::{Derivation, Sink, SinkOutcome};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
/// It registers all Python-exposed types and functions.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyGraph>()?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
