//! Error types for graph construction, evaluation and sink execution.

use thiserror::Error;

use crate::graph::NodeId;

/// Error type returned by user-supplied computations and side effects.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the dependency graph and the evaluator.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Registering the node would make it depend on itself.
    #[error("registering `{node}` would create a cycle: {}", render_path(.path))]
    Cycle {
        node: NodeId,
        /// The cycle, starting and ending at `node`.
        path: Vec<NodeId>,
    },

    #[error("node `{0}` is already registered")]
    DuplicateNode(NodeId),

    #[error("node `{node}` lists dependency `{dependency}` more than once")]
    DuplicateDependency { node: NodeId, dependency: NodeId },

    #[error("node `{node}` cannot depend on sink `{sink}`")]
    SinkDependency { node: NodeId, sink: NodeId },

    #[error("unknown node `{0}`")]
    UnknownNode(NodeId),

    #[error("node `{0}` is not a signal")]
    NotASignal(NodeId),

    /// Sinks hold no value and cannot be read.
    #[error("node `{0}` is a sink and cannot be read")]
    NotADerivation(NodeId),

    #[error("node `{node}` depends on `{dependency}`, which is not registered")]
    UnresolvedDependency { node: NodeId, dependency: NodeId },

    /// A derivation's computation failed. The derivation stays dirty.
    #[error("evaluating `{node}` failed: {source}")]
    Evaluation {
        node: NodeId,
        #[source]
        source: BoxError,
    },
}

impl GraphError {
    /// The node whose computation raised, if this is an evaluation failure.
    pub fn failed_node(&self) -> Option<&NodeId> {
        match self {
            Self::Evaluation { node, .. } => Some(node),
            _ => None,
        }
    }
}

fn render_path(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Per-sink failure reported by the sink runner.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's side effect returned an error.
    #[error("sink `{sink}` failed: {source}")]
    Failed {
        sink: NodeId,
        #[source]
        source: BoxError,
    },

    /// An upstream node could not be evaluated; the side effect did not run.
    #[error("sink `{sink}` skipped: {source}")]
    Dependency {
        sink: NodeId,
        #[source]
        source: GraphError,
    },

    #[error("unknown sink `{0}`")]
    UnknownSink(NodeId),

    #[error("node `{0}` is not a sink")]
    NotASink(NodeId),
}

impl SinkError {
    /// The sink this error belongs to.
    pub fn sink(&self) -> &NodeId {
        match self {
            Self::Failed { sink, .. } | Self::Dependency { sink, .. } => sink,
            Self::UnknownSink(sink) | Self::NotASink(sink) => sink,
        }
    }
}

/// Invalid or unparsable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
