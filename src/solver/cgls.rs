//! Conjugate gradient on the normal equations, `min ||A x - b||`.
//!
//! `A` is only touched through the graph's forward and adjoint callbacks, so
//! the operator is never assembled.
use super::trampoline::{adjoint_trampoline, forward_trampoline, EvalCallback};
use super::SolverError;
use crate::compute::kernel::{axpy, dot, norm2};
use crate::graph::FaoDag;
use crate::store::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CglsOptions {
    pub max_iters: usize,
    /// Stop once `||A^T r|| <= tol * ||A^T b||`.
    pub tol: f64,
}

impl Default for CglsOptions {
    fn default() -> Self {
        Self { max_iters: 200, tol: 1e-10 }
    }
}

/// State reported after each iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverIteration {
    pub iter_count: usize,
    pub residual_norm: f64,
    pub normal_residual_norm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CglsResult {
    pub x: Vec<f64>,
    pub iterations: usize,
    pub residual_norm: f64,
    pub converged: bool,
    pub trace: Vec<SolverIteration>,
}

/// Applies `callback` to `input`, writing the operator's response into `out`.
fn apply(
    dag: &mut FaoDag,
    callback: EvalCallback,
    direction: Direction,
    input: &[f64],
    out: &mut [f64],
) -> Result<(), SolverError> {
    dag.copy_input(input, direction)?;
    callback(dag)?;
    dag.copy_output(out, direction)?;
    Ok(())
}

pub fn solve(dag: &mut FaoDag, b: &[f64], options: &CglsOptions) -> Result<CglsResult, SolverError> {
    let (n, m) = (dag.input_len(), dag.output_len());
    if b.len() != m {
        return Err(SolverError::RhsLength { expected: m, actual: b.len() });
    }
    if options.tol.is_nan() || options.tol < 0.0 {
        return Err(SolverError::InvalidOption(format!("tolerance must be non-negative, got {}", options.tol)));
    }

    let mut x = vec![0.0; n];
    let mut r = b.to_vec();
    let mut s = vec![0.0; n];
    apply(dag, adjoint_trampoline, Direction::Adjoint, &r, &mut s)?;
    let mut p = s.clone();
    let mut q = vec![0.0; m];

    let threshold = options.tol * norm2(&s);
    let mut gamma = dot(&s, &s);
    let mut history = Vec::new();
    let mut converged = gamma.sqrt() <= threshold;
    let mut iterations = 0;

    while !converged && iterations < options.max_iters {
        apply(dag, forward_trampoline, Direction::Forward, &p, &mut q)?;
        let qq = dot(&q, &q);
        if qq == 0.0 {
            // p lies in the null space of A; no further progress is possible.
            break;
        }
        let alpha = gamma / qq;
        axpy(alpha, &p, &mut x);
        axpy(-alpha, &q, &mut r);
        apply(dag, adjoint_trampoline, Direction::Adjoint, &r, &mut s)?;

        let gamma_next = dot(&s, &s);
        let beta = gamma_next / gamma;
        for (pi, si) in p.iter_mut().zip(&s) {
            *pi = si + beta * *pi;
        }
        gamma = gamma_next;
        iterations += 1;

        let step = SolverIteration {
            iter_count: iterations,
            residual_norm: norm2(&r),
            normal_residual_norm: gamma.sqrt(),
        };
        trace!(iter = step.iter_count, residual = step.residual_norm, normal = step.normal_residual_norm, "cgls");
        history.push(step);
        converged = step.normal_residual_norm <= threshold;
    }

    let residual_norm = norm2(&r);
    if converged {
        debug!(iterations, residual_norm, "cgls converged");
    } else {
        warn!(iterations, residual_norm, max_iters = options.max_iters, "cgls stopped before reaching tolerance");
    }
    Ok(CglsResult { x, iterations, residual_norm, converged, trace: history })
}
