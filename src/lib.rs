//! Matrix-free evaluation of composite linear operators.
//!
//! A linear operator `A` is described as a DAG of atomic operators. The graph
//! evaluates `A x` (forward) and `A^T y` (adjoint) without ever assembling the
//! matrix, which is what first-order and Krylov solvers need.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod graph;
pub mod solver;
pub mod store;

#[cfg(feature = "python")]
mod bindings;

pub use config::DagConfig;
pub use graph::{BufferRole, DagBuilder, DagDescription, DagError, FaoDag, Node, Operator};
pub use store::{Direction, EdgeId, NodeId, Shape};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bindings::python::PyFaoDag>()?;
    Ok(())
}
