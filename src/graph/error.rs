//! Error taxonomy for graph construction and evaluation.
use crate::store::{Direction, EdgeId, NodeId};
use std::fmt;
use thiserror::Error;

/// Which of the four external buffer roles a length check was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    ForwardInput,
    ForwardOutput,
    AdjointInput,
    AdjointOutput,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferRole::ForwardInput => "forward input",
            BufferRole::ForwardOutput => "forward output",
            BufferRole::AdjointInput => "adjoint input",
            BufferRole::AdjointOutput => "adjoint output",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DagError {
    // --- Configuration faults (construction time) ---
    #[error("node {node} is out of range for a graph of {count} nodes")]
    NodeOutOfRange { node: NodeId, count: usize },
    #[error("edge {edge} referenced by node {node} is not in the edge registry")]
    UnknownEdge { node: NodeId, edge: EdgeId },
    #[error("edge {edge} is registered as {registered:?} but node {node} lists it as {side}")]
    EdgeEndpointMismatch { edge: EdgeId, node: NodeId, side: &'static str, registered: (NodeId, NodeId) },
    #[error("edge {edge} is listed more than once")]
    DuplicateEdge { edge: EdgeId },
    #[error("edge {edge} connects node {node} to itself")]
    SelfLoop { edge: EdgeId, node: NodeId },
    #[error("node {node} declares {ports} {side} ports for {edges} {side} edges")]
    PortCountMismatch { node: NodeId, side: &'static str, ports: usize, edges: usize },
    #[error("edge {edge} carries {source_len} elements at its source but {target_len} at its target")]
    EdgeSizeMismatch { edge: EdgeId, source_len: usize, target_len: usize },
    #[error("invalid shapes at node {node}: {msg}")]
    InvalidShape { node: NodeId, msg: String },
    #[error("root node {0} must not have input edges")]
    RootHasInputs(NodeId),
    #[error("terminal node {0} must not have output edges")]
    TerminalHasOutputs(NodeId),
    #[error("cycle detected through node {0}")]
    CycleDetected(NodeId),

    // --- Precondition violations (call time) ---
    #[error("{role} buffer holds {expected} elements, caller supplied {actual}")]
    LengthMismatch { role: BufferRole, expected: usize, actual: usize },
    #[error("batch pairs {instances} graph instances with {inputs} input vectors")]
    BatchSizeMismatch { instances: usize, inputs: usize },

    // --- Graph integrity ---
    #[error("{direction} traversal never visited nodes {nodes:?}")]
    UnvisitedNodes { direction: Direction, nodes: Vec<NodeId> },
}

impl DagError {
    /// True for faults detected while building the graph.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            DagError::LengthMismatch { .. } | DagError::BatchSizeMismatch { .. } | DagError::UnvisitedNodes { .. }
        )
    }
}
