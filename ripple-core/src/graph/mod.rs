//! Dependency Graph
//!
//! This module implements the computational dependency graph that tracks
//! relationships between signals, derivations and sinks.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are signals (roots), derivations (cached computations) or sinks
//!   (side-effecting leaves)
//! - Edges represent dependencies: if A depends on B, there is an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes
//! and mark them as dirty. Derivations recompute on their next read.
//!
//! # Registration
//!
//! Every node declares its dependencies once, when it is registered. A
//! dependency may name a node that does not exist yet; it stays unresolved
//! until a node with that id is registered, and reading through it fails
//! until then. Because of these forward references a registration can close
//! a cycle, so every registration is checked and rejected, leaving the graph
//! untouched, if it would.
//!
//! We maintain both forward (dependencies) and reverse (dependents) edges
//! to enable efficient traversal in both directions. Dependents of ids that
//! are not registered yet are parked in a pending table and handed to the
//! node when it arrives.

pub(crate) mod node;
mod scheduler;

pub use node::{ComputeFn, DirtyState, Node, NodeId, NodeKind, SinkFn};

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::reactive::Definition;
use node::Body;

/// A reactive computation graph over values of type `V`.
///
/// Nodes are kept in registration order, which is also the order sinks run
/// in.
pub struct Graph<V> {
    config: GraphConfig,

    /// All registered nodes, indexed by ID.
    pub(crate) nodes: IndexMap<NodeId, Node<V>>,

    /// Dependents of ids that have been named as a dependency but not
    /// registered yet.
    pending: HashMap<NodeId, IndexSet<NodeId>>,
}

impl<V> Graph<V> {
    /// Create a new empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create a new empty graph.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            nodes: IndexMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Register a signal with its initial value.
    pub fn add_signal(&mut self, id: impl Into<NodeId>, value: V) -> Result<(), GraphError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }

        let dependents = self.pending.remove(&id).unwrap_or_default();
        debug!(signal = %id, dependents = dependents.len(), "signal registered");
        self.nodes.insert(
            id.clone(),
            Node::new(id, SmallVec::new(), dependents, Body::Signal { value }),
        );
        Ok(())
    }

    /// Register a derivation or sink with a fixed list of dependencies.
    ///
    /// Dependency values are passed to the node's function in the order given
    /// here. Fails without modifying the graph if the id is taken, a
    /// dependency is listed twice, a dependency is a sink, or the
    /// registration would close a cycle.
    pub fn register<D, I>(&mut self, node: D, dependencies: I) -> Result<(), GraphError>
    where
        D: Into<Definition<V>>,
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        let definition = node.into();
        let dependencies: SmallVec<[NodeId; 4]> =
            dependencies.into_iter().map(Into::into).collect();

        self.check_registration(definition.id(), definition.kind(), &dependencies)?;

        let (id, body) = match definition {
            Definition::Derivation(derivation) => {
                let (id, compute) = derivation.into_parts();
                let body = Body::Derivation {
                    compute,
                    cached: None,
                    state: DirtyState::Dirty,
                    evaluations: 0,
                };
                (id, body)
            }
            Definition::Sink(sink) => {
                let (id, run) = sink.into_parts();
                (id, Body::Sink { run, runs: 0 })
            }
        };

        for dependency in &dependencies {
            match self.nodes.get_mut(dependency) {
                Some(upstream) => upstream.add_dependent(id.clone()),
                None => {
                    self.pending
                        .entry(dependency.clone())
                        .or_default()
                        .insert(id.clone());
                }
            }
        }

        let dependents = self.pending.remove(&id).unwrap_or_default();
        let node = Node::new(id.clone(), dependencies, dependents, body);
        debug!(
            node = %id,
            kind = ?node.kind(),
            dependencies = node.dependencies().len(),
            "node registered"
        );
        self.nodes.insert(id, node);
        Ok(())
    }

    fn check_registration(
        &self,
        id: &NodeId,
        kind: NodeKind,
        dependencies: &[NodeId],
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::DuplicateNode(id.clone()));
        }

        let mut seen = HashSet::with_capacity(dependencies.len());
        for dependency in dependencies {
            if !seen.insert(dependency) {
                return Err(GraphError::DuplicateDependency {
                    node: id.clone(),
                    dependency: dependency.clone(),
                });
            }
            if self.kind(dependency.as_str()) == Some(NodeKind::Sink) {
                return Err(GraphError::SinkDependency {
                    node: id.clone(),
                    sink: dependency.clone(),
                });
            }
        }

        if kind == NodeKind::Sink {
            if let Some(waiting) = self.pending.get(id).and_then(|w| w.first()) {
                return Err(GraphError::SinkDependency {
                    node: waiting.clone(),
                    sink: id.clone(),
                });
            }
        }

        // The new edges run dependency -> id. They close a cycle exactly when
        // some dependency is already reachable downstream of id.
        for dependency in dependencies {
            if let Some(mut path) = self.find_path(id, dependency) {
                path.push(id.clone());
                return Err(GraphError::Cycle {
                    node: id.clone(),
                    path,
                });
            }
        }

        Ok(())
    }

    /// Breadth-first search along dependent edges, including pending ones.
    ///
    /// Returns the path from `from` to `to`, both inclusive.
    fn find_path(&self, from: &NodeId, to: &NodeId) -> Option<Vec<NodeId>> {
        if from == to {
            return Some(vec![from.clone()]);
        }

        let mut parents: HashMap<&NodeId, &NodeId> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current).into_iter().flatten() {
                if next == from || parents.contains_key(next) {
                    continue;
                }
                parents.insert(next, current);

                if next == to {
                    let mut path = vec![to.clone()];
                    let mut cursor = to;
                    while let Some(&parent) = parents.get(cursor) {
                        path.push(parent.clone());
                        cursor = parent;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    fn dependents_of(&self, id: &NodeId) -> Option<&IndexSet<NodeId>> {
        match self.nodes.get(id) {
            Some(node) => Some(node.dependents()),
            None => self.pending.get(id),
        }
    }

    /// Get a reference to a node.
    pub fn node(&self, id: &str) -> Option<&Node<V>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.nodes.get(id).map(Node::kind)
    }

    /// Get the total number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a derivation's cache is stale. `None` for other kinds and
    /// unknown ids.
    pub fn is_dirty(&self, id: &str) -> Option<bool> {
        self.nodes
            .get(id)
            .and_then(Node::dirty_state)
            .map(|state| state == DirtyState::Dirty)
    }

    pub fn dependencies(&self, id: &str) -> Option<&[NodeId]> {
        self.nodes.get(id).map(Node::dependencies)
    }

    pub fn dependents(&self, id: &str) -> Option<&IndexSet<NodeId>> {
        self.nodes.get(id).map(Node::dependents)
    }

    /// All sinks, in registration order.
    pub fn sink_ids(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.kind() == NodeKind::Sink)
            .map(|node| node.id().clone())
            .collect()
    }

    /// Ids named as dependencies that have not been registered, sorted.
    pub fn unresolved(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of times a derivation's computation has been invoked.
    ///
    /// Returns `None` for unknown ids and for nodes that are not derivations.
    pub fn evaluation_count(&self, id: &str) -> Option<u64> {
        self.nodes.get(id).and_then(Node::evaluations)
    }

    /// Number of times a sink's side effect has been invoked.
    ///
    /// Returns `None` for unknown ids and for nodes that are not sinks.
    pub fn run_count(&self, id: &str) -> Option<u64> {
        self.nodes.get(id).and_then(Node::runs)
    }
}

impl<V> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Graph<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("label", &self.config.label)
            .field("nodes", &self.nodes.len())
            .field("unresolved", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Derivation, Sink};

    fn add(id: &str) -> Derivation<i32> {
        Derivation::infallible(id, |v: &[i32]| v.iter().sum())
    }

    #[test]
    fn register_links_both_directions() {
        let mut graph = Graph::new();
        graph.add_signal("a", 1).unwrap();
        graph.register(add("d"), ["a"]).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies("d").unwrap(), &[NodeId::from("a")]);
        assert!(graph.dependents("a").unwrap().contains("d"));
        assert_eq!(graph.kind("d"), Some(NodeKind::Derivation));
        assert_eq!(graph.is_dirty("d"), Some(true));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut graph = Graph::new();
        graph.add_signal("a", 1).unwrap();

        assert!(matches!(
            graph.add_signal("a", 2),
            Err(GraphError::DuplicateNode(_))
        ));
        assert!(matches!(
            graph.register(add("a"), ["a"]),
            Err(GraphError::DuplicateNode(_))
        ));
    }

    #[test]
    fn duplicate_dependency_is_rejected() {
        let mut graph = Graph::new();
        graph.add_signal("a", 1).unwrap();

        let err = graph.register(add("d"), ["a", "a"]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateDependency { .. }));
        assert!(!graph.contains("d"));
        assert!(graph.dependents("a").unwrap().is_empty());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut graph: Graph<i32> = Graph::new();

        let err = graph.register(add("loop"), ["loop"]).unwrap_err();
        match err {
            GraphError::Cycle { node, path } => {
                assert_eq!(node.as_str(), "loop");
                assert_eq!(path, vec![NodeId::from("loop"), NodeId::from("loop")]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(graph.is_empty());
        assert!(graph.unresolved().is_empty());
    }

    #[test]
    fn forward_reference_cycle_is_rejected() {
        let mut graph: Graph<i32> = Graph::new();
        graph.register(add("a"), ["c"]).unwrap();
        graph.register(add("b"), ["a"]).unwrap();

        let err = graph.register(add("c"), ["b"]).unwrap_err();
        match err {
            GraphError::Cycle { path, .. } => {
                let path: Vec<_> = path.iter().map(NodeId::as_str).collect();
                assert_eq!(path, vec!["c", "a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        // The graph is unchanged: `c` is still only a pending dependency.
        assert!(!graph.contains("c"));
        assert_eq!(graph.unresolved(), vec![NodeId::from("c")]);
        assert!(graph.dependents("b").unwrap().is_empty());
    }

    #[test]
    fn forward_reference_resolves_on_registration() {
        let mut graph = Graph::new();
        graph.register(add("d"), ["later"]).unwrap();
        assert_eq!(graph.unresolved(), vec![NodeId::from("later")]);

        graph.add_signal("later", 4).unwrap();
        assert!(graph.unresolved().is_empty());
        assert!(graph.dependents("later").unwrap().contains("d"));
    }

    #[test]
    fn nothing_may_depend_on_a_sink() {
        let mut graph = Graph::new();
        graph.add_signal("a", 1).unwrap();
        graph
            .register(Sink::infallible("out", |_: &[i32]| {}), ["a"])
            .unwrap();

        let err = graph.register(add("d"), ["out"]).unwrap_err();
        assert!(matches!(err, GraphError::SinkDependency { .. }));

        // A sink may not take an id something already waits on either.
        graph.register(add("e"), ["late"]).unwrap();
        let err = graph
            .register(Sink::infallible("late", |_: &[i32]| {}), ["a"])
            .unwrap_err();
        assert!(matches!(err, GraphError::SinkDependency { .. }));
    }

    #[test]
    fn sink_ids_follow_registration_order() {
        let mut graph = Graph::new();
        graph.add_signal("a", 1).unwrap();
        graph
            .register(Sink::infallible("second", |_: &[i32]| {}), ["a"])
            .unwrap();
        graph.register(add("d"), ["a"]).unwrap();
        graph
            .register(Sink::infallible("first", |_: &[i32]| {}), ["d"])
            .unwrap();

        assert_eq!(
            graph.sink_ids(),
            vec![NodeId::from("second"), NodeId::from("first")]
        );
    }
}
