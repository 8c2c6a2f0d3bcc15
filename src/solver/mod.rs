//! Iterative solvers that drive an operator graph through its evaluation callbacks.
pub mod cgls;
pub mod trampoline;

use crate::graph::DagError;
use thiserror::Error;

pub use cgls::{solve, CglsOptions, CglsResult, SolverIteration};
pub use trampoline::{adjoint_trampoline, forward_trampoline, static_adjoint_eval, static_forward_eval, EvalCallback};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("right-hand side has {actual} elements, operator output has {expected}")]
    RhsLength { expected: usize, actual: usize },
    #[error("invalid solver option: {0}")]
    InvalidOption(String),
    #[error("operator evaluation failed: {0}")]
    Evaluation(#[from] DagError),
}
