//! Invalidation and Ordering
//!
//! When a signal changes, the dirty flag has to reach every derivation that
//! reads it, directly or through other derivations, and the sinks at the end
//! of those paths have to be reported back so the caller can re-run them.
//!
//! # Algorithm
//!
//! 1. Start from the changed node's direct dependents.
//! 2. Walk dependent edges breadth-first, visiting each node at most once,
//!    so diamond-shaped graphs are handled without duplicate work.
//! 3. Mark every visited derivation dirty and collect every visited sink.
//! 4. Return the sinks ordered by registration.
//!
//! Nothing is recomputed here. Derivations are pulled up to date by the
//! evaluator on their next read.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use super::node::Body;
use super::{Graph, NodeId, NodeKind};
use crate::error::GraphError;

impl<V> Graph<V> {
    /// Replace a signal's value and invalidate everything downstream.
    ///
    /// Returns the sinks reachable from the signal, in registration order.
    pub fn set(&mut self, signal: &str, value: V) -> Result<Vec<NodeId>, GraphError> {
        let node = self
            .nodes
            .get_mut(signal)
            .ok_or_else(|| GraphError::UnknownNode(NodeId::from(signal)))?;

        let Body::Signal { value: slot } = &mut node.body else {
            return Err(GraphError::NotASignal(NodeId::from(signal)));
        };
        *slot = value;

        let id = node.id().clone();
        Ok(self.mark_changed(&id))
    }

    /// Force a node and everything downstream of it to be treated as changed.
    ///
    /// A derivation is marked dirty itself; a signal keeps its value. Returns
    /// the reachable sinks exactly like [`Graph::set`], and a sink returns
    /// only itself.
    pub fn invalidate(&mut self, id: &str) -> Result<Vec<NodeId>, GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(NodeId::from(id)))?;

        if node.kind() == NodeKind::Sink {
            return Ok(vec![node.id().clone()]);
        }

        node.mark_dirty();
        let id = node.id().clone();
        Ok(self.mark_changed(&id))
    }

    /// Mark everything downstream of `source` dirty.
    ///
    /// Returns the reached sinks in registration order.
    fn mark_changed(&mut self, source: &NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut sinks = Vec::new();
        let mut dirtied = 0usize;

        // Start with the source node's direct dependents
        if let Some(node) = self.nodes.get(source) {
            queue.extend(node.dependents().iter().cloned());
        }

        // BFS to propagate dirty status
        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id.clone()) {
                continue;
            }

            let Some((index, _, node)) = self.nodes.get_full_mut(&node_id) else {
                continue;
            };

            match node.kind() {
                NodeKind::Derivation => {
                    node.mark_dirty();
                    dirtied += 1;
                }
                NodeKind::Sink => sinks.push((index, node_id.clone())),
                NodeKind::Signal => {}
            }

            // Propagate to dependents
            for dependent_id in node.dependents() {
                if !visited.contains(dependent_id) {
                    queue.push_back(dependent_id.clone());
                }
            }
        }

        sinks.sort_by_key(|(index, _)| *index);
        debug!(
            source = %source,
            dirtied,
            sinks = sinks.len(),
            "propagated change"
        );
        sinks.into_iter().map(|(_, id)| id).collect()
    }

    /// All registered nodes such that dependencies come before dependents.
    ///
    /// Uses Kahn's algorithm; nodes that become ready at the same time keep
    /// their registration order. Unresolved dependencies are ignored.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<&NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        let mut ready = BTreeSet::new();

        for (index, (id, node)) in self.nodes.iter().enumerate() {
            let degree = node
                .dependencies()
                .iter()
                .filter(|dependency| self.nodes.contains_key(*dependency))
                .count();
            in_degree.insert(id, degree);
            if degree == 0 {
                ready.insert(index);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(index) = ready.pop_first() {
            let Some((id, node)) = self.nodes.get_index(index) else {
                continue;
            };
            order.push(id.clone());

            for dependent_id in node.dependents() {
                if let Some(degree) = in_degree.get_mut(dependent_id) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        if let Some(dependent_index) = self.nodes.get_index_of(dependent_id) {
                            ready.insert(dependent_index);
                        }
                    }
                }
            }
        }

        order
    }
}
