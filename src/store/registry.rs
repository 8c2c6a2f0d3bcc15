use super::types::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One forward-directed data dependency between two node buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId) -> Self { Self { source, target } }
}

/// Maps edge ids to their (source, target) pair.
///
/// Ordered by id so iteration, validation messages and traversal seeding are
/// deterministic for a fixed registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeRegistry {
    edges: BTreeMap<EdgeId, Edge>,
}

impl EdgeRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.edges.is_empty() }

    /// Registers `id`. Returns the previous entry if the id was already taken.
    pub fn insert(&mut self, id: EdgeId, source: NodeId, target: NodeId) -> Option<Edge> {
        self.edges.insert(id, Edge::new(source, target))
    }

    #[inline(always)]
    pub fn get(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter().map(|(&id, edge)| (id, edge))
    }

    /// Smallest id strictly greater than every registered id.
    pub fn next_id(&self) -> EdgeId {
        self.edges.keys().next_back().map_or(EdgeId(0), |id| EdgeId(id.0 + 1))
    }
}

impl FromIterator<(EdgeId, (NodeId, NodeId))> for EdgeRegistry {
    fn from_iter<I: IntoIterator<Item = (EdgeId, (NodeId, NodeId))>>(iter: I) -> Self {
        let edges = iter
            .into_iter()
            .map(|(id, (source, target))| (id, Edge::new(source, target)))
            .collect();
        Self { edges }
    }
}
