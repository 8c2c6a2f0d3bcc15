//! Bidirectional dependency-counting scheduler over the operator DAG.
use crate::graph::error::DagError;
use crate::graph::node::{EdgeList, Node};
use crate::store::{Direction, EdgeId, EdgeRegistry, NodeId};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::VecDeque;
use tracing::trace;

/// Edge lists of one node, held apart from its buffers so a traversal can
/// borrow the node arena mutably while it walks the topology.
#[derive(Debug, Clone, Default)]
struct Adjacency {
    inputs: EdgeList,
    outputs: EdgeList,
}

/// Immutable wiring of a constructed graph.
#[derive(Debug, Clone)]
pub struct Topology {
    adjacency: Vec<Adjacency>,
    edges: EdgeRegistry,
    root: NodeId,
    terminal: NodeId,
}

impl Topology {
    pub fn new(nodes: &[Node], edges: EdgeRegistry, root: NodeId, terminal: NodeId) -> Self {
        let adjacency = nodes
            .iter()
            .map(|n| Adjacency { inputs: n.input_edges.clone(), outputs: n.output_edges.clone() })
            .collect();
        Self { adjacency, edges, root, terminal }
    }

    pub fn node_count(&self) -> usize { self.adjacency.len() }
    pub fn edges(&self) -> &EdgeRegistry { &self.edges }
    pub fn root(&self) -> NodeId { self.root }
    pub fn terminal(&self) -> NodeId { self.terminal }

    /// Edges leaving `node` in the given direction of travel.
    #[inline]
    pub fn downstream(&self, node: NodeId, direction: Direction) -> &[EdgeId] {
        let adj = &self.adjacency[node.index()];
        match direction {
            Direction::Forward => &adj.outputs,
            Direction::Adjoint => &adj.inputs,
        }
    }

    /// Number of edges `node` waits on before it is ready in the given direction.
    #[inline]
    fn dependency_count(&self, node: NodeId, direction: Direction) -> usize {
        let adj = &self.adjacency[node.index()];
        match direction {
            Direction::Forward => adj.inputs.len(),
            Direction::Adjoint => adj.outputs.len(),
        }
    }

    /// Visits every node once in dependency order, applying `node_fn`.
    ///
    /// Forward runs from the root along output edges; adjoint runs from the
    /// terminal along input edges. A node is enqueued once all edges it depends
    /// on from that direction have reported. Ties are broken by arrival order.
    /// The queue and visit counters live only for the duration of the call.
    ///
    /// With `verify` set, nodes the walk never reached are returned as
    /// [`DagError::UnvisitedNodes`]. Returns the number of nodes visited.
    pub fn traverse<F>(&self, direction: Direction, verify: bool, mut node_fn: F) -> Result<usize, DagError>
    where
        F: FnMut(NodeId) -> Result<(), DagError>,
    {
        let count = self.adjacency.len();
        let start = match direction {
            Direction::Forward => self.root,
            Direction::Adjoint => self.terminal,
        };
        let mut arrivals = vec![0usize; count];
        let mut visited = vec![false; count];
        let mut ready = VecDeque::with_capacity(count);
        let mut visited_count = 0;

        ready.push_back(start);
        while let Some(curr) = ready.pop_front() {
            node_fn(curr)?;
            visited[curr.index()] = true;
            visited_count += 1;

            for &edge_id in self.downstream(curr, direction) {
                let edge = self.edges.get(edge_id).ok_or(DagError::UnknownEdge { node: curr, edge: edge_id })?;
                let next = match direction {
                    Direction::Forward => edge.target,
                    Direction::Adjoint => edge.source,
                };
                let slot = arrivals.get_mut(next.index()).ok_or(DagError::NodeOutOfRange { node: next, count })?;
                *slot += 1;
                if *slot == self.dependency_count(next, direction) {
                    ready.push_back(next);
                }
            }
        }

        trace!(%direction, visited = visited_count, nodes = count, "traversal finished");

        if verify && visited_count != count {
            let nodes = visited
                .iter()
                .enumerate()
                .filter(|&(_, &seen)| !seen)
                .map(|(i, _)| NodeId::new(i))
                .collect();
            return Err(DagError::UnvisitedNodes { direction, nodes });
        }
        Ok(visited_count)
    }

    /// Visit order of a full traversal without touching any buffers.
    pub fn order(&self, direction: Direction) -> Result<Vec<NodeId>, DagError> {
        let mut order = Vec::with_capacity(self.adjacency.len());
        self.traverse(direction, true, |id| {
            order.push(id);
            Ok(())
        })?;
        Ok(order)
    }

    /// Rejects wiring that contains a directed cycle.
    ///
    /// A cycle never satisfies the counting scheduler, so without this check it
    /// would only surface as unvisited nodes.
    pub fn check_acyclic(&self) -> Result<(), DagError> {
        let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(self.adjacency.len(), self.edges.count());
        let indices: Vec<_> = (0..self.adjacency.len()).map(|_| graph.add_node(())).collect();
        for (_, edge) in self.edges.iter() {
            if let (Some(&s), Some(&t)) = (indices.get(edge.source.index()), indices.get(edge.target.index())) {
                graph.add_edge(s, t, ());
            }
        }
        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| DagError::CycleDetected(NodeId::new(cycle.node_id().index())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::operator::Operator;
    use crate::store::Shape;

    fn node(inputs: &[u32], outputs: &[u32]) -> Node {
        let ins: Vec<EdgeId> = inputs.iter().map(|&e| EdgeId(e)).collect();
        let outs: Vec<EdgeId> = outputs.iter().map(|&e| EdgeId(e)).collect();
        Node::new(Operator::NoOp, vec![Shape::vector(1)], vec![Shape::vector(1)]).with_edges(&ins, &outs)
    }

    fn registry(edges: &[(u32, u32, u32)]) -> EdgeRegistry {
        edges.iter().map(|&(e, s, t)| (EdgeId(e), (NodeId(s), NodeId(t)))).collect()
    }

    /// Diamond: 0 -> {1, 2} -> 3
    fn diamond() -> Topology {
        let nodes = vec![node(&[], &[0, 1]), node(&[0], &[2]), node(&[1], &[3]), node(&[2, 3], &[])];
        let edges = registry(&[(0, 0, 1), (1, 0, 2), (2, 1, 3), (3, 2, 3)]);
        Topology::new(&nodes, edges, NodeId(0), NodeId(3))
    }

    #[test]
    fn test_diamond_forward_and_reverse_orders() {
        let topo = diamond();
        let fwd = topo.order(Direction::Forward).unwrap();
        assert_eq!(fwd, vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]);

        let rev = topo.order(Direction::Adjoint).unwrap();
        // Reverse walk follows the terminal's input edges in declared order.
        assert_eq!(rev, vec![NodeId(3), NodeId(1), NodeId(2), NodeId(0)]);
    }

    #[test]
    fn test_each_node_visited_once_and_state_does_not_leak() {
        let topo = diamond();
        for direction in [Direction::Forward, Direction::Adjoint] {
            let first = topo.order(direction).unwrap();
            for _ in 0..3 {
                let mut hits = vec![0; topo.node_count()];
                let visited = topo
                    .traverse(direction, true, |id| {
                        hits[id.index()] += 1;
                        Ok(())
                    })
                    .unwrap();
                assert_eq!(visited, 4);
                assert!(hits.iter().all(|&h| h == 1));
                assert_eq!(topo.order(direction).unwrap(), first);
            }
        }
    }

    #[test]
    fn test_unsatisfied_node_reported() {
        // Node 2 waits on edge 5, which nothing ever feeds.
        let nodes = vec![node(&[], &[0]), node(&[0], &[1]), node(&[1, 5], &[])];
        let edges = registry(&[(0, 0, 1), (1, 1, 2), (5, 3, 2)]);
        let topo = Topology::new(&nodes, edges, NodeId(0), NodeId(2));

        let err = topo.order(Direction::Forward).unwrap_err();
        assert_eq!(err, DagError::UnvisitedNodes { direction: Direction::Forward, nodes: vec![NodeId(2)] });

        // Without verification the walk silently stops short.
        let visited = topo.traverse(Direction::Forward, false, |_| Ok(())).unwrap();
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_missing_edge_is_reported_mid_traversal() {
        let nodes = vec![node(&[], &[0]), node(&[0], &[])];
        let topo = Topology::new(&nodes, EdgeRegistry::new(), NodeId(0), NodeId(1));
        let err = topo.order(Direction::Forward).unwrap_err();
        assert_eq!(err, DagError::UnknownEdge { node: NodeId(0), edge: EdgeId(0) });
    }

    #[test]
    fn test_node_fn_failure_aborts_walk() {
        let topo = diamond();
        let mut seen = Vec::new();
        let err = topo
            .traverse(Direction::Forward, true, |id| {
                seen.push(id);
                if id == NodeId(1) {
                    return Err(DagError::RootHasInputs(id));
                }
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err, DagError::RootHasInputs(NodeId(1)));
        assert_eq!(seen, vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn test_cycle_detection() {
        let nodes = vec![node(&[], &[0]), node(&[0, 2], &[1]), node(&[1], &[2])];
        let edges = registry(&[(0, 0, 1), (1, 1, 2), (2, 2, 1)]);
        let topo = Topology::new(&nodes, edges, NodeId(0), NodeId(2));
        assert!(matches!(topo.check_acyclic(), Err(DagError::CycleDetected(_))));
        assert!(diamond().check_acyclic().is_ok());
    }
}
