//! Offset-addressed buffer copies between neighbouring nodes.
//!
//! A node with several input edges receives each contribution into its own
//! slice of one contiguous input buffer (implicit concatenation); a node with
//! several output edges has each slice of its output buffer routed separately
//! (implicit splitting). The adjoint pass runs the same copies backwards, from
//! input slices into the upstream node's output slices.
use crate::graph::error::DagError;
use crate::graph::node::Node;
use crate::store::{Direction, EdgeRegistry, NodeId};

/// Mutable access to two distinct nodes of the arena at once.
fn pair_mut(nodes: &mut [Node], a: NodeId, b: NodeId) -> (&mut Node, &mut Node) {
    let (i, j) = (a.index(), b.index());
    debug_assert_ne!(i, j);
    if i < j {
        let (lo, hi) = nodes.split_at_mut(j);
        (&mut lo[i], &mut hi[0])
    } else {
        let (lo, hi) = nodes.split_at_mut(i);
        (&mut hi[0], &mut lo[j])
    }
}

/// Moves `node`'s freshly computed slices to its neighbours in `direction`.
///
/// Forward: every output slice lands in the target's input buffer.
/// Adjoint: every input slice lands in the source's output buffer.
pub fn propagate(nodes: &mut [Node], edges: &EdgeRegistry, node: NodeId, direction: Direction) -> Result<(), DagError> {
    let edge_ids = match direction {
        Direction::Forward => nodes[node.index()].output_edges.clone(),
        Direction::Adjoint => nodes[node.index()].input_edges.clone(),
    };

    for (slot, edge_id) in edge_ids.into_iter().enumerate() {
        let edge = edges.get(edge_id).ok_or(DagError::UnknownEdge { node, edge: edge_id })?;
        let neighbour = match direction {
            Direction::Forward => edge.target,
            Direction::Adjoint => edge.source,
        };
        if neighbour == node {
            return Err(DagError::SelfLoop { edge: edge_id, node });
        }
        let (from, to) = pair_mut(nodes, node, neighbour);

        let (src, src_at, dst, dst_at, len) = match direction {
            Direction::Forward => (
                &from.output_data,
                from.output_offsets.get(edge_id),
                &mut to.input_data,
                to.input_offsets.get(edge_id),
                from.output_sizes[slot].elem_len(),
            ),
            Direction::Adjoint => (
                &from.input_data,
                from.input_offsets.get(edge_id),
                &mut to.output_data,
                to.output_offsets.get(edge_id),
                from.input_sizes[slot].elem_len(),
            ),
        };
        let src_at = src_at.ok_or(DagError::UnknownEdge { node, edge: edge_id })?;
        let dst_at = dst_at.ok_or(DagError::UnknownEdge { node: neighbour, edge: edge_id })?;

        dst[dst_at..dst_at + len].copy_from_slice(&src[src_at..src_at + len]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::operator::Operator;
    use crate::store::{EdgeId, Shape};

    /// 0 splits [3 | 2] into two consumers, 1 and 2.
    fn split_pair() -> (Vec<Node>, EdgeRegistry) {
        let mut nodes = vec![
            Node::new(Operator::Split, vec![Shape::vector(5)], vec![Shape::vector(3), Shape::vector(2)])
                .with_edges(&[], &[EdgeId(10), EdgeId(11)]),
            Node::new(Operator::NoOp, vec![Shape::vector(3)], vec![Shape::vector(3)]).with_edges(&[EdgeId(10)], &[]),
            Node::new(Operator::NoOp, vec![Shape::vector(2)], vec![Shape::vector(2)]).with_edges(&[EdgeId(11)], &[]),
        ];
        for n in &mut nodes {
            n.alloc_data();
            n.init_offset_maps();
        }
        let edges = [(EdgeId(10), (NodeId(0), NodeId(1))), (EdgeId(11), (NodeId(0), NodeId(2)))]
            .into_iter()
            .collect();
        (nodes, edges)
    }

    #[test]
    fn test_forward_routes_disjoint_slices() {
        let (mut nodes, edges) = split_pair();
        nodes[0].output_data.copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        propagate(&mut nodes, &edges, NodeId(0), Direction::Forward).unwrap();
        assert_eq!(nodes[1].input_data(), &[1.0, 2.0, 3.0]);
        assert_eq!(nodes[2].input_data(), &[4.0, 5.0]);
    }

    #[test]
    fn test_adjoint_gathers_into_upstream_output() {
        let (mut nodes, edges) = split_pair();
        nodes[1].input_data.copy_from_slice(&[7.0, 8.0, 9.0]);
        nodes[2].input_data.copy_from_slice(&[-1.0, -2.0]);
        propagate(&mut nodes, &edges, NodeId(2), Direction::Adjoint).unwrap();
        propagate(&mut nodes, &edges, NodeId(1), Direction::Adjoint).unwrap();
        assert_eq!(nodes[0].output_data(), &[7.0, 8.0, 9.0, -1.0, -2.0]);
    }

    #[test]
    fn test_missing_registry_entry() {
        let (mut nodes, _) = split_pair();
        let err = propagate(&mut nodes, &EdgeRegistry::new(), NodeId(0), Direction::Forward).unwrap_err();
        assert_eq!(err, DagError::UnknownEdge { node: NodeId(0), edge: EdgeId(10) });
    }
}
