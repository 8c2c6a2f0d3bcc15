//! JSON interchange format for operator graphs.
//!
//! A description lists nodes in id order, the edge registry, and the two
//! distinguished nodes:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "op": { "type": "neg" }, "input_sizes": [[3]], "output_sizes": [[3]],
//!       "input_edges": [], "output_edges": [0] },
//!     { "op": { "type": "no_op" }, "input_sizes": [[3]], "output_sizes": [[3]],
//!       "input_edges": [0], "output_edges": [] }
//!   ],
//!   "edges": [ { "id": 0, "source": 0, "target": 1 } ],
//!   "root": 0,
//!   "terminal": 1
//! }
//! ```
use super::dag::FaoDag;
use super::error::DagError;
use super::node::Node;
use super::operator::Operator;
use crate::config::DagConfig;
use crate::store::{EdgeId, EdgeRegistry, NodeId, Shape};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("malformed graph description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read graph description: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid graph: {0}")]
    Graph(#[from] DagError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub op: Operator,
    pub input_sizes: Vec<Shape>,
    pub output_sizes: Vec<Shape>,
    #[serde(default)]
    pub input_edges: Vec<EdgeId>,
    #[serde(default)]
    pub output_edges: Vec<EdgeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagDescription {
    pub nodes: Vec<NodeDescription>,
    pub edges: Vec<EdgeDescription>,
    pub root: NodeId,
    pub terminal: NodeId,
    #[serde(default)]
    pub config: DagConfig,
}

impl DagDescription {
    pub fn from_json(text: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, DescriptionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Snapshot of a constructed graph's wiring and operators.
    pub fn from_dag(dag: &FaoDag) -> Self {
        let nodes = dag
            .nodes()
            .iter()
            .map(|n| NodeDescription {
                op: n.op.clone(),
                input_sizes: n.input_sizes.clone(),
                output_sizes: n.output_sizes.clone(),
                input_edges: n.input_edges.to_vec(),
                output_edges: n.output_edges.to_vec(),
            })
            .collect();
        let topology = dag.topology();
        let edges = topology
            .edges()
            .iter()
            .map(|(id, e)| EdgeDescription { id, source: e.source, target: e.target })
            .collect();
        Self { nodes, edges, root: topology.root(), terminal: topology.terminal(), config: dag.config().clone() }
    }

    pub fn into_dag(self) -> Result<FaoDag, DescriptionError> {
        let mut registry = EdgeRegistry::new();
        for e in &self.edges {
            if registry.insert(e.id, e.source, e.target).is_some() {
                return Err(DagError::DuplicateEdge { edge: e.id }.into());
            }
        }
        let nodes = self
            .nodes
            .into_iter()
            .map(|d| Node::new(d.op, d.input_sizes, d.output_sizes).with_edges(&d.input_edges, &d.output_edges))
            .collect();
        Ok(FaoDag::new(nodes, self.root, self.terminal, registry, self.config)?)
    }
}
