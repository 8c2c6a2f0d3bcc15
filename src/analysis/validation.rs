//! Structural checks run once before a graph is allowed to allocate.
use crate::graph::error::DagError;
use crate::graph::node::Node;
use crate::graph::operator::LinearOp;
use crate::store::{EdgeRegistry, NodeId, Shape};
use std::collections::HashSet;

/// Verifies that node edge lists, port declarations and the edge registry
/// describe the same wiring.
///
/// Acyclicity and reachability are checked afterwards on the built topology.
pub fn validate_structure(nodes: &[Node], edges: &EdgeRegistry, root: NodeId, terminal: NodeId) -> Result<(), DagError> {
    let count = nodes.len();
    for id in [root, terminal] {
        if id.index() >= count {
            return Err(DagError::NodeOutOfRange { node: id, count });
        }
    }
    if !nodes[root.index()].input_edges.is_empty() {
        return Err(DagError::RootHasInputs(root));
    }
    if !nodes[terminal.index()].output_edges.is_empty() {
        return Err(DagError::TerminalHasOutputs(terminal));
    }

    let mut seen_inputs = HashSet::new();
    let mut seen_outputs = HashSet::new();

    for (i, node) in nodes.iter().enumerate() {
        let id = NodeId::new(i);

        // The root and terminal each expose one external port with no edge.
        let external_in = usize::from(id == root);
        let external_out = usize::from(id == terminal);
        check_ports(id, "input", node.input_sizes.len(), node.input_edges.len(), external_in)?;
        check_ports(id, "output", node.output_sizes.len(), node.output_edges.len(), external_out)?;
        check_buffer_len(id, "input", &node.input_sizes)?;
        check_buffer_len(id, "output", &node.output_sizes)?;

        node.op
            .check_shapes(node.ports())
            .map_err(|msg| DagError::InvalidShape { node: id, msg: format!("{} ({})", msg, node.op.name()) })?;

        for &edge_id in &node.input_edges {
            let edge = edges.get(edge_id).ok_or(DagError::UnknownEdge { node: id, edge: edge_id })?;
            if edge.target != id {
                return Err(DagError::EdgeEndpointMismatch {
                    edge: edge_id,
                    node: id,
                    side: "input",
                    registered: (edge.source, edge.target),
                });
            }
            if !seen_inputs.insert(edge_id) {
                return Err(DagError::DuplicateEdge { edge: edge_id });
            }
        }
        for &edge_id in &node.output_edges {
            let edge = edges.get(edge_id).ok_or(DagError::UnknownEdge { node: id, edge: edge_id })?;
            if edge.source != id {
                return Err(DagError::EdgeEndpointMismatch {
                    edge: edge_id,
                    node: id,
                    side: "output",
                    registered: (edge.source, edge.target),
                });
            }
            if !seen_outputs.insert(edge_id) {
                return Err(DagError::DuplicateEdge { edge: edge_id });
            }
        }
    }

    for (edge_id, edge) in edges.iter() {
        for end in [edge.source, edge.target] {
            if end.index() >= count {
                return Err(DagError::NodeOutOfRange { node: end, count });
            }
        }
        if edge.source == edge.target {
            return Err(DagError::SelfLoop { edge: edge_id, node: edge.source });
        }
        // Every registered edge must be claimed by both of its endpoints.
        if !seen_outputs.contains(&edge_id) {
            return Err(DagError::EdgeEndpointMismatch {
                edge: edge_id,
                node: edge.source,
                side: "missing output",
                registered: (edge.source, edge.target),
            });
        }
        if !seen_inputs.contains(&edge_id) {
            return Err(DagError::EdgeEndpointMismatch {
                edge: edge_id,
                node: edge.target,
                side: "missing input",
                registered: (edge.source, edge.target),
            });
        }

        let source_len = nodes[edge.source.index()].edge_len(edge_id).unwrap_or(0);
        let target_len = nodes[edge.target.index()].edge_len(edge_id).unwrap_or(0);
        if source_len != target_len {
            return Err(DagError::EdgeSizeMismatch { edge: edge_id, source_len, target_len });
        }
    }

    Ok(())
}

fn check_ports(node: NodeId, side: &'static str, ports: usize, edges: usize, external: usize) -> Result<(), DagError> {
    if ports == edges + external {
        Ok(())
    } else {
        Err(DagError::PortCountMismatch { node, side, ports, edges })
    }
}

/// Every port length, and their sum, must fit in `usize` before any operator
/// arithmetic runs on them.
fn check_buffer_len(node: NodeId, side: &str, sizes: &[Shape]) -> Result<usize, DagError> {
    sizes
        .iter()
        .try_fold(0usize, |total, shape| shape.checked_elem_len().and_then(|len| total.checked_add(len)))
        .ok_or_else(|| DagError::InvalidShape { node, msg: format!("{} buffer length overflows", side) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::operator::Operator;
    use crate::store::EdgeId;

    fn chain() -> (Vec<Node>, EdgeRegistry) {
        let nodes = vec![
            Node::new(Operator::NoOp, vec![Shape::vector(3)], vec![Shape::vector(3)]).with_edges(&[], &[EdgeId(0)]),
            Node::new(Operator::Neg, vec![Shape::vector(3)], vec![Shape::vector(3)]).with_edges(&[EdgeId(0)], &[]),
        ];
        let edges = [(EdgeId(0), (NodeId(0), NodeId(1)))].into_iter().collect();
        (nodes, edges)
    }

    #[test]
    fn test_valid_chain_passes() {
        let (nodes, edges) = chain();
        assert_eq!(validate_structure(&nodes, &edges, NodeId(0), NodeId(1)), Ok(()));
    }

    #[test]
    fn test_unregistered_input_edge() {
        let (nodes, _) = chain();
        let err = validate_structure(&nodes, &EdgeRegistry::new(), NodeId(0), NodeId(1)).unwrap_err();
        assert!(matches!(err, DagError::UnknownEdge { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_registry_pair_disagrees_with_node() {
        let (mut nodes, edges) = chain();
        nodes.push(Node::new(Operator::NoOp, vec![Shape::vector(3)], vec![Shape::vector(3)]));
        let mut bad = edges.clone();
        bad.insert(EdgeId(0), NodeId(0), NodeId(2));
        let err = validate_structure(&nodes, &bad, NodeId(0), NodeId(1)).unwrap_err();
        assert!(matches!(err, DagError::EdgeEndpointMismatch { node: NodeId(1), side: "input", .. }), "{:?}", err);
    }

    #[test]
    fn test_edge_size_mismatch() {
        let (mut nodes, edges) = chain();
        nodes[1] = Node::new(Operator::Neg, vec![Shape::vector(4)], vec![Shape::vector(4)]).with_edges(&[EdgeId(0)], &[]);
        let err = validate_structure(&nodes, &edges, NodeId(0), NodeId(1)).unwrap_err();
        assert_eq!(err, DagError::EdgeSizeMismatch { edge: EdgeId(0), source_len: 3, target_len: 4 });
    }

    #[test]
    fn test_root_with_inputs_rejected() {
        let (nodes, edges) = chain();
        let err = validate_structure(&nodes, &edges, NodeId(1), NodeId(1)).unwrap_err();
        assert_eq!(err, DagError::RootHasInputs(NodeId(1)));
    }

    #[test]
    fn test_port_count_mismatch() {
        let (mut nodes, edges) = chain();
        nodes[0].input_sizes.push(Shape::vector(1));
        let err = validate_structure(&nodes, &edges, NodeId(0), NodeId(1)).unwrap_err();
        assert!(matches!(err, DagError::PortCountMismatch { side: "input", ports: 2, .. }));
    }

    #[test]
    fn test_out_of_range_terminal() {
        let (nodes, edges) = chain();
        let err = validate_structure(&nodes, &edges, NodeId(0), NodeId(9)).unwrap_err();
        assert_eq!(err, DagError::NodeOutOfRange { node: NodeId(9), count: 2 });
    }

    #[test]
    fn test_overflowing_port_shape_rejected() {
        let (mut nodes, edges) = chain();
        nodes[0].input_sizes = vec![Shape::matrix(usize::MAX / 2, 3)];
        let err = validate_structure(&nodes, &edges, NodeId(0), NodeId(1)).unwrap_err();
        assert!(matches!(err, DagError::InvalidShape { node: NodeId(0), .. }), "{:?}", err);
    }

    #[test]
    fn test_overflowing_buffer_total_rejected() {
        assert_eq!(check_buffer_len(NodeId(1), "output", &[Shape::vector(3), Shape::vector(2)]), Ok(5));
        let err = check_buffer_len(NodeId(1), "output", &[Shape::vector(usize::MAX), Shape::vector(2)]).unwrap_err();
        assert_eq!(err, DagError::InvalidShape { node: NodeId(1), msg: "output buffer length overflows".into() });
    }
}
