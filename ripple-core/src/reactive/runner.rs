//! Sink Runner
//!
//! Re-executes sinks after a propagation pass. Each sink's dependencies are
//! pulled up to date through the evaluator before its side effect runs.
//!
//! Failures are isolated: a sink whose side effect fails, or whose inputs
//! cannot be evaluated, is reported in its own outcome and the remaining
//! sinks still run.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::graph::node::Body;
use crate::graph::{Graph, NodeId, NodeKind};

/// Result of running one sink.
pub type SinkOutcome = Result<(), SinkError>;

impl<V: Clone> Graph<V> {
    /// Run the given sinks in registration order.
    ///
    /// Duplicate ids run once. Ids that are not registered sinks are reported
    /// after the registered ones, in the order they were requested.
    pub fn run_all<I>(&mut self, sinks: I) -> Vec<(NodeId, SinkOutcome)>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut registered = Vec::new();
        let mut unknown = Vec::new();

        for id in sinks {
            let id = id.as_ref();
            if !seen.insert(id.to_owned()) {
                continue;
            }
            match self.nodes.get_index_of(id) {
                Some(index) => registered.push(index),
                None => unknown.push(NodeId::from(id)),
            }
        }
        registered.sort_unstable();

        let mut outcomes = Vec::with_capacity(registered.len() + unknown.len());
        for index in registered {
            let Some((id, _)) = self.nodes.get_index(index) else {
                continue;
            };
            let id = id.clone();
            let outcome = self.run_sink(&id);
            match &outcome {
                Ok(()) => debug!(sink = %id, "sink ran"),
                Err(err) => warn!(sink = %id, error = %err, "sink failed"),
            }
            outcomes.push((id, outcome));
        }

        for id in unknown {
            warn!(sink = %id, "unknown sink requested");
            outcomes.push((id.clone(), Err(SinkError::UnknownSink(id))));
        }

        outcomes
    }

    fn run_sink(&mut self, id: &NodeId) -> SinkOutcome {
        match self.kind(id.as_str()) {
            Some(NodeKind::Sink) => {}
            Some(_) => return Err(SinkError::NotASink(id.clone())),
            None => return Err(SinkError::UnknownSink(id.clone())),
        }

        let inputs = self
            .resolve_inputs(id)
            .map_err(|source| SinkError::Dependency {
                sink: id.clone(),
                source,
            })?;

        let Some(Body::Sink { run, runs }) = self.nodes.get_mut(id).map(|node| &mut node.body)
        else {
            return Err(SinkError::NotASink(id.clone()));
        };

        *runs += 1;
        (*run)(inputs.as_slice()).map_err(|source| SinkError::Failed {
            sink: id.clone(),
            source,
        })
    }
}

/// Serializable digest of a [`Graph::run_all`] result, for the layer that
/// renders outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: Vec<NodeId>,
    pub failed: Vec<SinkFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkFailure {
    pub sink: NodeId,
    pub message: String,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[(NodeId, SinkOutcome)]) -> Self {
        let mut summary = Self::default();
        for (sink, outcome) in outcomes {
            match outcome {
                Ok(()) => summary.succeeded.push(sink.clone()),
                Err(err) => summary.failed.push(SinkFailure {
                    sink: sink.clone(),
                    message: err.to_string(),
                }),
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
