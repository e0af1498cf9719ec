//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::BoxError;

/// Unique identifier for a node in the dependency graph.
///
/// Signals, derivations and sinks share one namespace. Lookups accept a plain
/// `&str` through the `Borrow<str>` impl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create an identifier from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// An externally mutable value cell. These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Signal,

    /// A cached computation over upstream nodes.
    Derivation,

    /// A side-effecting consumer. These are leaves of the graph.
    /// They have dependencies but no dependents.
    Sink,
}

/// Dirty state of a derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The cached value is up-to-date.
    Clean,

    /// The cached value is stale (or was never computed).
    Dirty,
}

/// Computation run by a derivation. Receives dependency values in
/// declaration order.
pub type ComputeFn<V> = Box<dyn Fn(&[V]) -> Result<V, BoxError> + Send>;

/// Side effect run by a sink. Receives dependency values in declaration order.
pub type SinkFn<V> = Box<dyn FnMut(&[V]) -> Result<(), BoxError> + Send>;

/// What a node holds, by kind.
pub(crate) enum Body<V> {
    Signal {
        value: V,
    },
    Derivation {
        compute: ComputeFn<V>,
        cached: Option<V>,
        state: DirtyState,
        evaluations: u64,
    },
    Sink {
        run: SinkFn<V>,
        runs: u64,
    },
}

/// A node in the dependency graph.
pub struct Node<V> {
    /// Unique identifier for this node.
    id: NodeId,

    /// Nodes that this node reads from, in declaration order.
    /// Fixed at registration.
    dependencies: SmallVec<[NodeId; 4]>,

    /// Nodes that read from this node, in registration order.
    dependents: IndexSet<NodeId>,

    pub(crate) body: Body<V>,
}

impl<V> Node<V> {
    pub(crate) fn new(
        id: NodeId,
        dependencies: SmallVec<[NodeId; 4]>,
        dependents: IndexSet<NodeId>,
        body: Body<V>,
    ) -> Self {
        Self {
            id,
            dependencies,
            dependents,
            body,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        match self.body {
            Body::Signal { .. } => NodeKind::Signal,
            Body::Derivation { .. } => NodeKind::Derivation,
            Body::Sink { .. } => NodeKind::Sink,
        }
    }

    /// Get the dirty state. Only derivations carry one.
    pub fn dirty_state(&self) -> Option<DirtyState> {
        match self.body {
            Body::Derivation { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Check if the node holds a value that can be read without recomputing.
    pub fn is_clean(&self) -> bool {
        match &self.body {
            Body::Signal { .. } => true,
            Body::Derivation { state, cached, .. } => {
                *state == DirtyState::Clean && cached.is_some()
            }
            Body::Sink { .. } => false,
        }
    }

    /// Mark a derivation as needing recomputation. No-op for other kinds.
    pub(crate) fn mark_dirty(&mut self) {
        if let Body::Derivation { state, .. } = &mut self.body {
            *state = DirtyState::Dirty;
        }
    }

    /// Get all dependencies.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// Get all dependents.
    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    pub(crate) fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    /// Number of times the derivation's computation has been invoked.
    /// `None` for signals and sinks.
    pub fn evaluations(&self) -> Option<u64> {
        match self.body {
            Body::Derivation { evaluations, .. } => Some(evaluations),
            _ => None,
        }
    }

    /// Number of times the sink's side effect has been invoked. `None` for
    /// signals and derivations.
    pub fn runs(&self) -> Option<u64> {
        match self.body {
            Body::Sink { runs, .. } => Some(runs),
            _ => None,
        }
    }
}

impl<V> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("dirty", &self.dirty_state())
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .finish()
    }
}
