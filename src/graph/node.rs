//! A single atomic operator together with the buffers it reads and writes.
use super::operator::{LinearOp, Operator, Ports};
use crate::store::{EdgeId, Shape};
use smallvec::SmallVec;

pub type EdgeList = SmallVec<[EdgeId; 4]>;

/// Position of each edge's slice inside one of a node's contiguous buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    entries: SmallVec<[(EdgeId, usize); 4]>,
}

impl OffsetMap {
    /// Lays `edges` out back to back using the element length of the matching port.
    fn tile(edges: &[EdgeId], sizes: &[Shape]) -> Self {
        let mut offset = 0;
        let entries = edges
            .iter()
            .zip(sizes)
            .map(|(&edge, shape)| {
                let at = offset;
                offset += shape.elem_len();
                (edge, at)
            })
            .collect();
        Self { entries }
    }

    #[inline]
    pub fn get(&self, edge: EdgeId) -> Option<usize> {
        self.entries.iter().find(|(e, _)| *e == edge).map(|&(_, at)| at)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, usize)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// One vertex of the operator DAG.
///
/// Input edge `i` delivers `input_sizes[i]`; output edge `i` carries
/// `output_sizes[i]`. The root may declare a single input port without an edge
/// (the external input), the terminal a single output port without an edge.
/// Buffers are empty until the owning graph calls [`Node::alloc_data`].
#[derive(Debug, Clone)]
pub struct Node {
    pub op: Operator,
    pub input_edges: EdgeList,
    pub output_edges: EdgeList,
    pub input_sizes: Vec<Shape>,
    pub output_sizes: Vec<Shape>,
    pub(crate) input_data: Vec<f64>,
    pub(crate) output_data: Vec<f64>,
    pub(crate) input_offsets: OffsetMap,
    pub(crate) output_offsets: OffsetMap,
}

impl Node {
    pub fn new(op: Operator, input_sizes: Vec<Shape>, output_sizes: Vec<Shape>) -> Self {
        Self {
            op,
            input_edges: EdgeList::new(),
            output_edges: EdgeList::new(),
            input_sizes,
            output_sizes,
            input_data: Vec::new(),
            output_data: Vec::new(),
            input_offsets: OffsetMap::default(),
            output_offsets: OffsetMap::default(),
        }
    }

    pub fn with_edges(mut self, inputs: &[EdgeId], outputs: &[EdgeId]) -> Self {
        self.input_edges = EdgeList::from_slice(inputs);
        self.output_edges = EdgeList::from_slice(outputs);
        self
    }

    pub fn ports(&self) -> Ports<'_> {
        Ports { inputs: &self.input_sizes, outputs: &self.output_sizes }
    }

    pub fn input_len(&self) -> usize { self.ports().input_len() }
    pub fn output_len(&self) -> usize { self.ports().output_len() }

    pub fn alloc_data(&mut self) {
        self.input_data = vec![0.0; self.input_len()];
        self.output_data = vec![0.0; self.output_len()];
    }

    pub fn free_data(&mut self) {
        self.input_data = Vec::new();
        self.output_data = Vec::new();
    }

    pub fn init_offset_maps(&mut self) {
        self.input_offsets = OffsetMap::tile(&self.input_edges, &self.input_sizes);
        self.output_offsets = OffsetMap::tile(&self.output_edges, &self.output_sizes);
    }

    pub fn input_offsets(&self) -> &OffsetMap { &self.input_offsets }
    pub fn output_offsets(&self) -> &OffsetMap { &self.output_offsets }
    pub fn input_data(&self) -> &[f64] { &self.input_data }
    pub fn output_data(&self) -> &[f64] { &self.output_data }

    /// Element length of the port carrying `edge`, looked up on either side.
    pub fn edge_len(&self, edge: EdgeId) -> Option<usize> {
        let find = |edges: &EdgeList, sizes: &[Shape]| {
            edges.iter().position(|&e| e == edge).and_then(|i| sizes.get(i)).map(Shape::elem_len)
        };
        find(&self.output_edges, &self.output_sizes).or_else(|| find(&self.input_edges, &self.input_sizes))
    }

    #[inline]
    pub fn forward_eval(&mut self) {
        let ports = Ports { inputs: &self.input_sizes, outputs: &self.output_sizes };
        self.op.forward(ports, &self.input_data, &mut self.output_data);
    }

    #[inline]
    pub fn adjoint_eval(&mut self) {
        let ports = Ports { inputs: &self.input_sizes, outputs: &self.output_sizes };
        self.op.adjoint(ports, &self.output_data, &mut self.input_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_maps_tile_buffers() {
        let mut node = Node::new(
            Operator::Concat,
            vec![Shape::vector(3), Shape::matrix(2, 2), Shape::vector(1)],
            vec![Shape::vector(8)],
        )
        .with_edges(&[EdgeId(9), EdgeId(4), EdgeId(6)], &[EdgeId(2)]);
        node.alloc_data();
        node.init_offset_maps();

        assert_eq!(node.input_data().len(), 8);
        assert_eq!(node.output_data().len(), 8);
        assert_eq!(node.input_offsets().get(EdgeId(9)), Some(0));
        assert_eq!(node.input_offsets().get(EdgeId(4)), Some(3));
        assert_eq!(node.input_offsets().get(EdgeId(6)), Some(7));
        assert_eq!(node.output_offsets().get(EdgeId(2)), Some(0));
        assert_eq!(node.input_offsets().get(EdgeId(2)), None);
        assert_eq!(node.edge_len(EdgeId(4)), Some(4));
    }

    #[test]
    fn test_free_data_releases_buffers() {
        let mut node = Node::new(Operator::NoOp, vec![Shape::vector(4)], vec![Shape::vector(4)]);
        node.alloc_data();
        assert_eq!(node.input_len(), 4);
        node.free_data();
        assert!(node.input_data().is_empty());
        assert!(node.output_data().is_empty());
    }
}
