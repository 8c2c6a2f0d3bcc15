//! Incremental construction of an operator graph.
use super::dag::FaoDag;
use super::error::DagError;
use super::node::Node;
use super::operator::Operator;
use crate::config::DagConfig;
use crate::store::{EdgeId, EdgeRegistry, NodeId, Shape};

/// Collects nodes and edges, then hands them to [`FaoDag::new`].
///
/// Edges are numbered in the order they are connected and occupy the next
/// free port on each endpoint, so `connect` calls must follow the port order
/// the operators expect.
#[derive(Debug, Default)]
pub struct DagBuilder {
    nodes: Vec<Node>,
    edges: EdgeRegistry,
    config: DagConfig,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: DagConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_node(&mut self, op: Operator, input_sizes: Vec<Shape>, output_sizes: Vec<Shape>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::new(op, input_sizes, output_sizes));
        id
    }

    /// Wires `source`'s next output port to `target`'s next input port.
    ///
    /// Unknown node ids are recorded as-is and reported by `build`.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> EdgeId {
        let id = self.edges.next_id();
        self.edges.insert(id, source, target);
        if let Some(node) = self.nodes.get_mut(source.index()) {
            node.output_edges.push(id);
        }
        if let Some(node) = self.nodes.get_mut(target.index()) {
            node.input_edges.push(id);
        }
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn build(self, root: NodeId, terminal: NodeId) -> Result<FaoDag, DagError> {
        FaoDag::new(self.nodes, root, terminal, self.edges, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;

    #[test]
    fn test_connect_assigns_sequential_ids_and_ports() {
        let mut b = DagBuilder::new();
        let split = b.add_node(Operator::Split, vec![Shape::vector(3)], vec![Shape::vector(1), Shape::vector(2)]);
        let concat = b.add_node(Operator::Concat, vec![Shape::vector(2), Shape::vector(1)], vec![Shape::vector(3)]);
        assert_eq!(b.connect(split, concat), EdgeId(0));
        let second = b.connect(split, concat);
        assert_eq!(second, EdgeId(1));
        assert_eq!(b.node_count(), 2);

        // First split slice lands in the first concat port, so sizes disagree.
        let err = b.build(split, concat).unwrap_err();
        assert_eq!(err, DagError::EdgeSizeMismatch { edge: EdgeId(0), source_len: 1, target_len: 2 });
    }

    #[test]
    fn test_split_then_concat_restores_input() {
        let mut b = DagBuilder::new().with_config(DagConfig::default().with_label("split_concat"));
        let split = b.add_node(Operator::Split, vec![Shape::vector(5)], vec![Shape::vector(2), Shape::vector(3)]);
        let left = b.add_node(Operator::ScalarMul { alpha: 2.0 }, vec![Shape::vector(2)], vec![Shape::vector(2)]);
        let concat = b.add_node(Operator::Concat, vec![Shape::vector(2), Shape::vector(3)], vec![Shape::vector(5)]);
        b.connect(split, left);
        b.connect(left, concat);
        b.connect(split, concat);
        let mut dag = b.build(split, concat).unwrap();
        assert_eq!(dag.config().label(), "split_concat");

        dag.copy_input(&[1.0, 2.0, 3.0, 4.0, 5.0], Direction::Forward).unwrap();
        dag.forward_eval().unwrap();
        assert_eq!(dag.forward_output(), &[2.0, 4.0, 3.0, 4.0, 5.0]);

        dag.copy_input(&[1.0; 5], Direction::Adjoint).unwrap();
        dag.adjoint_eval().unwrap();
        assert_eq!(dag.adjoint_output(), &[2.0, 2.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unknown_endpoint_surfaces_at_build() {
        let mut b = DagBuilder::new();
        let a = b.add_node(Operator::NoOp, vec![Shape::vector(2)], vec![Shape::vector(2)]);
        b.connect(a, NodeId(7));
        let err = b.build(a, a).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut b = DagBuilder::new();
        let root = b.add_node(Operator::NoOp, vec![Shape::vector(2)], vec![Shape::vector(2)]);
        let mix = b.add_node(Operator::Sum, vec![Shape::vector(2), Shape::vector(2)], vec![Shape::vector(2)]);
        let fan = b.add_node(Operator::Copy, vec![Shape::vector(2)], vec![Shape::vector(2), Shape::vector(2)]);
        let end = b.add_node(Operator::NoOp, vec![Shape::vector(2)], vec![Shape::vector(2)]);
        b.connect(root, mix);
        b.connect(mix, fan);
        b.connect(fan, mix);
        b.connect(fan, end);
        let err = b.build(root, end).unwrap_err();
        assert!(matches!(err, DagError::CycleDetected(_)), "{:?}", err);
    }
}
