//! Sink Definition
//!
//! A Sink is a terminal consumer of the graph, such as a render target.
//! It caches nothing: every propagation pass that reaches it runs its side
//! effect again with the current values of its dependencies.
//!
//! Nothing may depend on a sink.

use std::fmt;

use crate::error::BoxError;
use crate::graph::{NodeId, SinkFn};

/// A named side effect waiting to be registered with a graph.
pub struct Sink<V> {
    id: NodeId,
    run: SinkFn<V>,
}

impl<V> Sink<V> {
    /// Create a sink whose side effect may fail.
    pub fn new<F>(id: impl Into<NodeId>, run: F) -> Self
    where
        F: FnMut(&[V]) -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            id: id.into(),
            run: Box::new(run),
        }
    }

    /// Create a sink whose side effect cannot fail.
    pub fn infallible<F>(id: impl Into<NodeId>, mut run: F) -> Self
    where
        F: FnMut(&[V]) + Send + 'static,
    {
        Self::new(id, move |inputs: &[V]| {
            run(inputs);
            Ok(())
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub(crate) fn into_parts(self) -> (NodeId, SinkFn<V>) {
        (self.id, self.run)
    }
}

impl<V> fmt::Debug for Sink<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn sink_runs_side_effect() {
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();

        let sink = Sink::infallible("label", move |v: &[i32]| {
            seen_clone.store(v[0], Ordering::SeqCst);
        });
        assert_eq!(sink.id().as_str(), "label");

        let (_, mut run) = sink.into_parts();
        run(&[7]).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
