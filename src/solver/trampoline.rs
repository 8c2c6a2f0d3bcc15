//! Entry points that let an external iterative loop drive a graph.
//!
//! Rust callers pass [`forward_trampoline`] / [`adjoint_trampoline`] as
//! [`EvalCallback`] values. C callers that only carry an untyped context
//! pointer use [`static_forward_eval`] / [`static_adjoint_eval`].

use crate::graph::{DagError, FaoDag};
use libc::{c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Typed callback applying one direction of the operator in place.
pub type EvalCallback = fn(&mut FaoDag) -> Result<(), DagError>;

pub fn forward_trampoline(dag: &mut FaoDag) -> Result<(), DagError> {
    dag.forward_eval()
}

pub fn adjoint_trampoline(dag: &mut FaoDag) -> Result<(), DagError> {
    dag.adjoint_eval()
}

/// Runs `callback` on the graph behind `ctx`, mapping the outcome to a C status.
///
/// Returns 0 on success, 1 when evaluation reported an error, 2 on a panic
/// and -1 for a null context.
fn c_callback_wrapper(ctx: *mut c_void, callback: EvalCallback, name: &str) -> c_int {
    if ctx.is_null() {
        error!(callback = name, "null graph context");
        return -1;
    }
    // SAFETY: the caller guarantees `ctx` came from a live `&mut FaoDag`
    // and is not aliased for the duration of the call.
    let dag = unsafe { &mut *(ctx as *mut FaoDag) };
    match catch_unwind(AssertUnwindSafe(|| callback(dag))) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error!(callback = name, error = %e, "evaluation failed");
            1
        }
        Err(_) => {
            error!(callback = name, "panic during evaluation");
            2
        }
    }
}

/// # Safety
/// `ctx` must be null or point to a live `FaoDag` with no other outstanding
/// references.
pub unsafe extern "C" fn static_forward_eval(ctx: *mut c_void) -> c_int {
    c_callback_wrapper(ctx, forward_trampoline, "forward")
}

/// # Safety
/// Same contract as [`static_forward_eval`].
pub unsafe extern "C" fn static_adjoint_eval(ctx: *mut c_void) -> c_int {
    c_callback_wrapper(ctx, adjoint_trampoline, "adjoint")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DagBuilder, Operator};
    use crate::store::{Direction, Shape};

    fn scaler() -> FaoDag {
        let mut b = DagBuilder::new();
        let s = b.add_node(Operator::ScalarMul { alpha: 3.0 }, vec![Shape::vector(2)], vec![Shape::vector(2)]);
        let n = b.add_node(Operator::Neg, vec![Shape::vector(2)], vec![Shape::vector(2)]);
        b.connect(s, n);
        b.build(s, n).unwrap()
    }

    #[test]
    fn test_typed_callbacks() {
        let mut dag = scaler();
        let callbacks: [(EvalCallback, Direction); 2] =
            [(forward_trampoline, Direction::Forward), (adjoint_trampoline, Direction::Adjoint)];
        for (callback, direction) in callbacks {
            dag.copy_input(&[1.0, 2.0], direction).unwrap();
            callback(&mut dag).unwrap();
            let mut out = [0.0; 2];
            dag.copy_output(&mut out, direction).unwrap();
            assert_eq!(out, [-3.0, -6.0]);
        }
        assert_eq!(dag.stats().forward.evals, 1);
        assert_eq!(dag.stats().adjoint.evals, 1);
    }

    #[test]
    fn test_c_entry_points() {
        let mut dag = scaler();
        dag.copy_input(&[0.5, -1.0], Direction::Forward).unwrap();
        let ctx = &mut dag as *mut FaoDag as *mut c_void;
        assert_eq!(unsafe { static_forward_eval(ctx) }, 0);
        assert_eq!(unsafe { static_adjoint_eval(ctx) }, 0);
        assert_eq!(dag.forward_output(), &[-1.5, 3.0]);
        assert_eq!(dag.stats().adjoint.evals, 1);
    }

    #[test]
    fn test_null_context() {
        assert_eq!(unsafe { static_forward_eval(std::ptr::null_mut()) }, -1);
    }
}
