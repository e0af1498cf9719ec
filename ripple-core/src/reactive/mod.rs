//! Reactive Primitives
//!
//! This module implements the reactive side of the graph: the node
//! definitions users register, the evaluator that keeps derivations current,
//! and the runner that re-executes sinks.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for externally mutable state, created with
//! [`Graph::add_signal`](crate::graph::Graph::add_signal) and changed with
//! [`Graph::set`](crate::graph::Graph::set). Setting a signal marks every
//! derivation that reads it, directly or transitively, as dirty.
//!
//! ## Derivations
//!
//! A Derivation is a derived value that caches its result. It re-evaluates
//! only when read while dirty, resolving its own dependencies first.
//!
//! ## Sinks
//!
//! A Sink is a side-effecting consumer that runs whenever a propagation pass
//! reaches it. `set` returns the reached sinks; the caller hands them to
//! [`Graph::run_all`](crate::graph::Graph::run_all).
//!
//! # Implementation Notes
//!
//! Dependencies are declared explicitly when a node is registered instead of
//! being discovered by watching reads at runtime. The graph is an ordinary
//! value: there is no thread-local or global reactive context.

mod derivation;
mod sink;
mod evaluator;
mod runner;

pub use derivation::Derivation;
pub use sink::Sink;
pub use runner::{RunSummary, SinkFailure, SinkOutcome};

use crate::graph::{NodeId, NodeKind};

/// A node that can be registered with dependencies: a derivation or a sink.
#[derive(Debug)]
pub enum Definition<V> {
    Derivation(Derivation<V>),
    Sink(Sink<V>),
}

impl<V> Definition<V> {
    pub fn id(&self) -> &NodeId {
        match self {
            Self::Derivation(derivation) => derivation.id(),
            Self::Sink(sink) => sink.id(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Derivation(_) => NodeKind::Derivation,
            Self::Sink(_) => NodeKind::Sink,
        }
    }
}

impl<V> From<Derivation<V>> for Definition<V> {
    fn from(derivation: Derivation<V>) -> Self {
        Self::Derivation(derivation)
    }
}

impl<V> From<Sink<V>> for Definition<V> {
    fn from(sink: Sink<V>) -> Self {
        Self::Sink(sink)
    }
}
