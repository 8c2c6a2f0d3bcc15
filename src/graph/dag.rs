//! dag.rs
//! Owns the operator nodes and drives forward and adjoint evaluation over them.

use super::error::{BufferRole, DagError};
use super::node::Node;
use crate::analysis::telemetry::EvalStats;
use crate::analysis::topology::Topology;
use crate::analysis::validation::validate_structure;
use crate::compute::propagate::propagate;
use crate::config::DagConfig;
use crate::store::{Direction, EdgeRegistry, NodeId};
use std::time::Instant;
use tracing::{debug, trace};

/// A composite linear operator `A`, evaluated matrix-free.
///
/// `forward_eval` computes `A x` from the root's input buffer into the
/// terminal's output buffer. `adjoint_eval` computes `A^T y` over the same
/// buffers with the roles swapped: the terminal's output buffer is read as the
/// adjoint input and the root's input buffer receives the adjoint output.
///
/// Wiring is fixed at construction. Evaluation takes `&mut self`, so one
/// instance is never evaluated concurrently; use separate instances per thread.
#[derive(Debug)]
pub struct FaoDag {
    nodes: Vec<Node>,
    topology: Topology,
    stats: EvalStats,
    config: DagConfig,
}

impl FaoDag {
    /// Validates the wiring, then allocates buffers and offset maps on every
    /// node in forward dependency order.
    pub fn new(
        mut nodes: Vec<Node>,
        root: NodeId,
        terminal: NodeId,
        edges: EdgeRegistry,
        config: DagConfig,
    ) -> Result<Self, DagError> {
        validate_structure(&nodes, &edges, root, terminal)?;
        let topology = Topology::new(&nodes, edges, root, terminal);
        topology.check_acyclic()?;

        // Every node must be reachable from both ends, or one of the two
        // evaluations would silently skip it.
        topology.traverse(Direction::Forward, true, |id| {
            let node = &mut nodes[id.index()];
            node.alloc_data();
            node.init_offset_maps();
            Ok(())
        })?;
        topology.traverse(Direction::Adjoint, true, |_| Ok(()))?;

        debug!(
            graph = config.label(),
            nodes = nodes.len(),
            edges = topology.edges().count(),
            input_len = nodes[root.index()].input_len(),
            output_len = nodes[terminal.index()].output_len(),
            "operator graph constructed"
        );

        Ok(Self { nodes, topology, stats: EvalStats::default(), config })
    }

    /// Computes `A x` for the vector currently in [`forward_input`](Self::forward_input).
    pub fn forward_eval(&mut self) -> Result<(), DagError> {
        self.eval(Direction::Forward)
    }

    /// Computes `A^T y` for the vector currently in [`adjoint_input`](Self::adjoint_input).
    pub fn adjoint_eval(&mut self) -> Result<(), DagError> {
        self.eval(Direction::Adjoint)
    }

    pub fn eval(&mut self, direction: Direction) -> Result<(), DagError> {
        let start = Instant::now();
        let nodes = &mut self.nodes;
        let edges = self.topology.edges();
        self.topology.traverse(direction, self.config.verify_traversals, |id| {
            let node = &mut nodes[id.index()];
            match direction {
                Direction::Forward => node.forward_eval(),
                Direction::Adjoint => node.adjoint_eval(),
            }
            propagate(nodes, edges, id, direction)
        })?;
        let elapsed = start.elapsed();
        self.stats.record(direction, elapsed);
        trace!(graph = self.config.label(), %direction, elapsed_us = elapsed.as_micros() as u64, "evaluation done");
        Ok(())
    }

    /// Copies `data` into the buffer the next `direction` evaluation reads.
    ///
    /// On a length mismatch nothing is written.
    pub fn copy_input(&mut self, data: &[f64], direction: Direction) -> Result<(), DagError> {
        let role = match direction {
            Direction::Forward => BufferRole::ForwardInput,
            Direction::Adjoint => BufferRole::AdjointInput,
        };
        let target = self.buffer_mut(role);
        check_len(role, target.len(), data.len())?;
        target.copy_from_slice(data);
        Ok(())
    }

    /// Copies the result of the last `direction` evaluation into `out`.
    pub fn copy_output(&self, out: &mut [f64], direction: Direction) -> Result<(), DagError> {
        let role = match direction {
            Direction::Forward => BufferRole::ForwardOutput,
            Direction::Adjoint => BufferRole::AdjointOutput,
        };
        let source = self.buffer(role);
        check_len(role, source.len(), out.len())?;
        out.copy_from_slice(source);
        Ok(())
    }

    fn buffer(&self, role: BufferRole) -> &[f64] {
        match role {
            BufferRole::ForwardInput | BufferRole::AdjointOutput => &self.nodes[self.topology.root().index()].input_data,
            BufferRole::ForwardOutput | BufferRole::AdjointInput => {
                &self.nodes[self.topology.terminal().index()].output_data
            }
        }
    }

    fn buffer_mut(&mut self, role: BufferRole) -> &mut [f64] {
        let (root, terminal) = (self.topology.root(), self.topology.terminal());
        match role {
            BufferRole::ForwardInput | BufferRole::AdjointOutput => &mut self.nodes[root.index()].input_data,
            BufferRole::ForwardOutput | BufferRole::AdjointInput => &mut self.nodes[terminal.index()].output_data,
        }
    }

    // --- Zero-copy accessors ---
    pub fn forward_input(&self) -> &[f64] { self.buffer(BufferRole::ForwardInput) }
    pub fn forward_output(&self) -> &[f64] { self.buffer(BufferRole::ForwardOutput) }
    pub fn adjoint_input(&self) -> &[f64] { self.buffer(BufferRole::AdjointInput) }
    pub fn adjoint_output(&self) -> &[f64] { self.buffer(BufferRole::AdjointOutput) }
    pub fn forward_input_mut(&mut self) -> &mut [f64] { self.buffer_mut(BufferRole::ForwardInput) }
    pub fn forward_output_mut(&mut self) -> &mut [f64] { self.buffer_mut(BufferRole::ForwardOutput) }
    pub fn adjoint_input_mut(&mut self) -> &mut [f64] { self.buffer_mut(BufferRole::AdjointInput) }
    pub fn adjoint_output_mut(&mut self) -> &mut [f64] { self.buffer_mut(BufferRole::AdjointOutput) }

    /// Dimension of the operator's domain (`x` in `A x`).
    pub fn input_len(&self) -> usize { self.forward_input().len() }
    /// Dimension of the operator's codomain.
    pub fn output_len(&self) -> usize { self.forward_output().len() }

    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(id.index()) }
    pub fn nodes(&self) -> &[Node] { &self.nodes }
    pub fn topology(&self) -> &Topology { &self.topology }
    pub fn config(&self) -> &DagConfig { &self.config }
    pub fn stats(&self) -> &EvalStats { &self.stats }

    /// Releases every node buffer and hands back the accumulated statistics.
    pub fn finalize(mut self) -> EvalStats {
        self.config.report_on_drop = false;
        self.release();
        self.stats
    }

    fn release(&mut self) {
        for node in &mut self.nodes {
            node.free_data();
        }
    }
}

impl Drop for FaoDag {
    fn drop(&mut self) {
        if self.config.report_on_drop {
            debug!(graph = self.config.label(), "{}", self.stats.report());
        }
        self.release();
    }
}

fn check_len(role: BufferRole, expected: usize, actual: usize) -> Result<(), DagError> {
    if expected == actual {
        Ok(())
    } else {
        Err(DagError::LengthMismatch { role, expected, actual })
    }
}
