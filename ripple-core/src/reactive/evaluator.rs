//! Derivation Evaluator
//!
//! Reading a node pulls it up to date:
//!
//! 1. A signal returns its current value.
//! 2. A clean derivation returns its cached value.
//! 3. A dirty derivation first refreshes its stale upstream derivations,
//!    deepest first, then runs its computation on the dependency values,
//!    caches the result and becomes clean.
//!
//! Because invalidation visits each node once and recomputation clears the
//! dirty flag, a node shared by several paths (a diamond) is recomputed once
//! per change, no matter how many dependents read it.
//!
//! A failed computation leaves the derivation dirty, so the next read tries
//! again.

use tracing::{trace, warn};

use crate::error::GraphError;
use crate::graph::node::Body;
use crate::graph::{DirtyState, Graph, Node, NodeId};

/// Pending work while refreshing a chain of derivations.
enum Step {
    /// Refresh the node's stale dependencies, then compute it.
    Visit(NodeId),
    /// All inputs are clean; run the computation.
    Compute(NodeId),
}

impl<V: Clone> Graph<V> {
    /// Get the current value of a signal or derivation, recomputing if
    /// necessary.
    pub fn get(&mut self, id: &str) -> Result<V, GraphError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(NodeId::from(id)))?;

        match &node.body {
            Body::Signal { value } => return Ok(value.clone()),
            Body::Sink { .. } => return Err(GraphError::NotADerivation(node.id().clone())),
            Body::Derivation {
                cached: Some(value),
                state: DirtyState::Clean,
                ..
            } => {
                trace!(node = %id, "cache hit");
                return Ok(value.clone());
            }
            Body::Derivation { .. } => {}
        }

        let id = node.id().clone();
        let inputs = self.resolve_inputs(&id)?;
        self.recompute(&id, &inputs)
    }

    /// Bring every dependency of `id` up to date, then read them in
    /// declaration order.
    ///
    /// Stale derivations are refreshed with an explicit work stack, so the
    /// depth of a dependency chain is not limited by the call stack. A
    /// derivation is computed only once all of its inputs are clean. On the
    /// first failure the walk stops: the failing derivation and everything
    /// still waiting on it stay dirty.
    pub(crate) fn resolve_inputs(&mut self, id: &NodeId) -> Result<Vec<V>, GraphError> {
        let mut stack = Vec::new();
        self.push_stale_dependencies(id, &mut stack)?;

        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(node) => {
                    if self.nodes.get(&node).is_some_and(Node::is_clean) {
                        continue;
                    }
                    stack.push(Step::Compute(node.clone()));
                    self.push_stale_dependencies(&node, &mut stack)?;
                }
                Step::Compute(node) => {
                    let inputs = self.read_inputs(&node)?;
                    self.recompute(&node, &inputs)?;
                }
            }
        }

        self.read_inputs(id)
    }

    /// Queue the dependencies of `id` that are not clean. The last pushed is
    /// the first declared, so dependencies are refreshed in declaration
    /// order.
    fn push_stale_dependencies(&self, id: &NodeId, stack: &mut Vec<Step>) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;

        for dependency in node.dependencies().iter().rev() {
            match self.nodes.get(dependency) {
                None => {
                    return Err(GraphError::UnresolvedDependency {
                        node: id.clone(),
                        dependency: dependency.clone(),
                    })
                }
                Some(upstream) if upstream.is_clean() => {}
                Some(_) => stack.push(Step::Visit(dependency.clone())),
            }
        }
        Ok(())
    }

    /// Current values of the dependencies of `id`. Expects them refreshed.
    fn read_inputs(&self, id: &NodeId) -> Result<Vec<V>, GraphError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;

        let mut inputs = Vec::with_capacity(node.dependencies().len());
        for dependency in node.dependencies() {
            let value = match self.nodes.get(dependency).map(|upstream| &upstream.body) {
                Some(Body::Signal { value }) => value.clone(),
                Some(Body::Derivation {
                    cached: Some(value),
                    ..
                }) => value.clone(),
                Some(Body::Sink { .. }) => {
                    return Err(GraphError::NotADerivation(dependency.clone()))
                }
                Some(Body::Derivation { cached: None, .. }) | None => {
                    return Err(GraphError::UnresolvedDependency {
                        node: id.clone(),
                        dependency: dependency.clone(),
                    })
                }
            };
            inputs.push(value);
        }
        Ok(inputs)
    }

    fn recompute(&mut self, id: &NodeId, inputs: &[V]) -> Result<V, GraphError> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Err(GraphError::UnknownNode(id.clone()));
        };
        let Body::Derivation {
            compute,
            cached,
            state,
            evaluations,
        } = &mut node.body
        else {
            return Err(GraphError::NotADerivation(id.clone()));
        };

        *evaluations += 1;
        match (*compute)(inputs) {
            Ok(value) => {
                trace!(node = %id, evaluations = *evaluations, "recomputed");
                *cached = Some(value.clone());
                *state = DirtyState::Clean;
                Ok(value)
            }
            Err(source) => {
                warn!(node = %id, error = %source, "evaluation failed");
                Err(GraphError::Evaluation {
                    node: id.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::GraphError;
    use crate::graph::Graph;
    use crate::reactive::{Derivation, Sink};

    /// A derivation summing its inputs that counts its invocations.
    fn counted_sum(id: &str, calls: &Arc<AtomicUsize>) -> Derivation<i32> {
        let calls = calls.clone();
        Derivation::infallible(id, move |v: &[i32]| {
            calls.fetch_add(1, Ordering::SeqCst);
            v.iter().sum()
        })
    }

    #[test]
    fn derivation_computes_on_first_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();
        graph.add_signal("a", 20).unwrap();
        graph.register(counted_sum("d", &calls), ["a"]).unwrap();

        // Not computed yet
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(graph.get("d").unwrap(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(graph.is_dirty("d"), Some(false));
    }

    #[test]
    fn derivation_caches_value_when_clean() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();
        graph.add_signal("a", 42).unwrap();
        graph.register(counted_sum("d", &calls), ["a"]).unwrap();

        assert_eq!(graph.get("d").unwrap(), 42);
        assert_eq!(graph.get("d").unwrap(), 42);
        assert_eq!(graph.get("d").unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(graph.evaluation_count("d"), Some(1));
    }

    #[test]
    fn inputs_arrive_in_declaration_order() {
        let mut graph = Graph::new();
        graph.add_signal("num", 12).unwrap();
        graph.add_signal("den", 4).unwrap();
        graph
            .register(Derivation::infallible("forward", |v: &[i32]| v[0] / v[1]), ["num", "den"])
            .unwrap();
        graph
            .register(Derivation::infallible("backward", |v: &[i32]| v[0] / v[1]), ["den", "num"])
            .unwrap();

        assert_eq!(graph.get("forward").unwrap(), 3);
        assert_eq!(graph.get("backward").unwrap(), 0);
    }

    #[test]
    fn failed_evaluation_stays_dirty_and_retries() {
        let mut graph = Graph::new();
        graph.add_signal("den", 0).unwrap();
        graph
            .register(
                Derivation::new("inverse", |v: &[i32]| {
                    if v[0] == 0 {
                        return Err("division by zero".into());
                    }
                    Ok(100 / v[0])
                }),
                ["den"],
            )
            .unwrap();
        graph
            .register(Derivation::infallible("plus_one", |v: &[i32]| v[0] + 1), ["inverse"])
            .unwrap();

        let err = graph.get("plus_one").unwrap_err();
        assert_eq!(err.failed_node().map(|n| n.as_str()), Some("inverse"));
        assert_eq!(graph.is_dirty("inverse"), Some(true));
        assert_eq!(graph.is_dirty("plus_one"), Some(true));

        // Retrying without a change fails again and runs the computation again.
        assert!(graph.get("inverse").is_err());
        assert_eq!(graph.evaluation_count("inverse"), Some(2));

        graph.set("den", 4).unwrap();
        assert_eq!(graph.get("plus_one").unwrap(), 26);
        assert_eq!(graph.is_dirty("inverse"), Some(false));
    }

    #[test]
    fn unresolved_dependency_fails_until_registered() {
        let mut graph = Graph::new();
        graph
            .register(Derivation::infallible("double", |v: &[i32]| v[0] * 2), ["x"])
            .unwrap();

        assert!(matches!(
            graph.get("double"),
            Err(GraphError::UnresolvedDependency { .. })
        ));

        graph.add_signal("x", 21).unwrap();
        assert_eq!(graph.get("double").unwrap(), 42);
    }

    #[test]
    fn signals_are_readable_and_sinks_are_not() {
        let observed = Arc::new(AtomicI32::new(0));
        let observed_clone = observed.clone();

        let mut graph = Graph::new();
        graph.add_signal("a", 7).unwrap();
        graph
            .register(
                Sink::infallible("out", move |v: &[i32]| {
                    observed_clone.store(v[0], Ordering::SeqCst);
                }),
                ["a"],
            )
            .unwrap();

        assert_eq!(graph.get("a").unwrap(), 7);
        assert!(matches!(graph.get("out"), Err(GraphError::NotADerivation(_))));
        assert!(matches!(graph.get("missing"), Err(GraphError::UnknownNode(_))));
        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn long_chains_evaluate_without_recursion() {
        const DEPTH: usize = 100_000;

        let mut graph: Graph<u64> = Graph::new();
        graph.add_signal("n0", 0).unwrap();
        for i in 1..=DEPTH {
            graph
                .register(
                    Derivation::infallible(format!("n{i}"), |v: &[u64]| v[0] + 1),
                    [format!("n{}", i - 1)],
                )
                .unwrap();
        }

        let top = format!("n{DEPTH}");
        assert_eq!(graph.get(&top).unwrap(), DEPTH as u64);
        assert_eq!(graph.is_dirty("n1"), Some(false));

        graph.set("n0", 5).unwrap();
        assert_eq!(graph.get(&top).unwrap(), DEPTH as u64 + 5);
        assert_eq!(graph.evaluation_count(&top), Some(2));
    }

    #[test]
    fn failure_deep_in_a_chain_leaves_the_rest_dirty() {
        let mut graph: Graph<i64> = Graph::new();
        graph.add_signal("n0", 0).unwrap();
        for i in 1..=50 {
            let derivation = if i == 25 {
                Derivation::new(format!("n{i}"), |v: &[i64]| {
                    if v[0] < 0 {
                        return Err("negative".into());
                    }
                    Ok(v[0] + 1)
                })
            } else {
                Derivation::infallible(format!("n{i}"), |v: &[i64]| v[0] + 1)
            };
            graph.register(derivation, [format!("n{}", i - 1)]).unwrap();
        }

        graph.set("n0", -100).unwrap();
        let err = graph.get("n50").unwrap_err();
        assert_eq!(err.failed_node().map(|n| n.as_str()), Some("n25"));
        assert_eq!(graph.is_dirty("n24"), Some(false));
        assert_eq!(graph.is_dirty("n25"), Some(true));
        assert_eq!(graph.is_dirty("n50"), Some(true));

        graph.set("n0", 0).unwrap();
        assert_eq!(graph.get("n50").unwrap(), 50);
    }

    #[test]
    fn counters_only_apply_to_their_kind() {
        let mut graph = Graph::new();
        graph.add_signal("a", 1).unwrap();
        graph.register(Derivation::infallible("d", |v: &[i32]| v[0]), ["a"]).unwrap();
        graph.register(Sink::infallible("out", |_: &[i32]| {}), ["d"]).unwrap();

        assert_eq!(graph.evaluation_count("d"), Some(0));
        assert_eq!(graph.evaluation_count("a"), None);
        assert_eq!(graph.evaluation_count("out"), None);
        assert_eq!(graph.run_count("out"), Some(0));
        assert_eq!(graph.run_count("d"), None);
        assert_eq!(graph.run_count("missing"), None);
    }
}
