//! Graph Snapshots
//!
//! A snapshot is a serializable picture of a graph's structure and cache
//! state, for debugging tools and the rendering layer. Values are not
//! included: the payload type is opaque to the graph.

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeId, NodeKind};

/// Structure and cache state of a graph at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub label: String,
    /// Registered nodes, dependencies first.
    pub nodes: Vec<NodeSnapshot>,
    /// Ids named as dependencies but never registered.
    pub unresolved: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub dependencies: Vec<NodeId>,
    /// Only derivations have a dirty flag.
    pub dirty: Option<bool>,
    pub evaluations: u64,
    pub runs: u64,
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id.as_str() == id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode as MessagePack with field names, for compact transport.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

impl<V> Graph<V> {
    /// Capture the graph's structure and cache state.
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .topological_order()
            .iter()
            .filter_map(|id| self.node(id.as_str()))
            .map(|node| NodeSnapshot {
                id: node.id().clone(),
                kind: node.kind(),
                dependencies: node.dependencies().to_vec(),
                dirty: self.is_dirty(node.id().as_str()),
                evaluations: node.evaluations().unwrap_or_default(),
                runs: node.runs().unwrap_or_default(),
            })
            .collect();

        GraphSnapshot {
            label: self.config().label.clone(),
            nodes,
            unresolved: self.unresolved(),
        }
    }
}
