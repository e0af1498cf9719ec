//! Derivation Definition
//!
//! A Derivation is a cached value computed from upstream nodes. It is
//! recomputed lazily: a change upstream only marks it dirty, and the
//! computation runs again on the next read.
//!
//! Computations receive the current values of their dependencies in the
//! order the dependencies were declared at registration, and are expected to
//! be pure. Side effects belong in a [`Sink`](super::Sink).

use std::fmt;

use crate::error::BoxError;
use crate::graph::{ComputeFn, NodeId};

/// A named computation waiting to be registered with a graph.
///
/// # Example
///
/// ```rust
/// use ripple_core::graph::Graph;
/// use ripple_core::reactive::Derivation;
///
/// let mut graph = Graph::new();
/// graph.add_signal("a", 2).unwrap();
/// graph.add_signal("b", 3).unwrap();
/// graph
///     .register(Derivation::infallible("sum", |v: &[i32]| v[0] + v[1]), ["a", "b"])
///     .unwrap();
///
/// assert_eq!(graph.get("sum").unwrap(), 5);
/// ```
pub struct Derivation<V> {
    id: NodeId,
    compute: ComputeFn<V>,
}

impl<V> Derivation<V> {
    /// Create a derivation whose computation may fail.
    pub fn new<F>(id: impl Into<NodeId>, compute: F) -> Self
    where
        F: Fn(&[V]) -> Result<V, BoxError> + Send + 'static,
    {
        Self {
            id: id.into(),
            compute: Box::new(compute),
        }
    }

    /// Create a derivation whose computation cannot fail.
    pub fn infallible<F>(id: impl Into<NodeId>, compute: F) -> Self
    where
        F: Fn(&[V]) -> V + Send + 'static,
    {
        Self::new(id, move |inputs: &[V]| Ok(compute(inputs)))
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub(crate) fn into_parts(self) -> (NodeId, ComputeFn<V>) {
        (self.id, self.compute)
    }
}

impl<V> fmt::Debug for Derivation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infallible_wraps_result() {
        let derivation = Derivation::infallible("double", |v: &[i32]| v[0] * 2);
        assert_eq!(derivation.id().as_str(), "double");

        let (_, compute) = derivation.into_parts();
        assert_eq!(compute(&[21]).unwrap(), 42);
    }

    #[test]
    fn fallible_computation_reports_error() {
        let derivation = Derivation::new("ratio", |v: &[f64]| {
            if v[1] == 0.0 {
                return Err("division by zero".into());
            }
            Ok(v[0] / v[1])
        });

        let (_, compute) = derivation.into_parts();
        assert_eq!(compute(&[1.0, 4.0]).unwrap(), 0.25);
        assert_eq!(compute(&[1.0, 0.0]).unwrap_err().to_string(), "division by zero");
    }
}
