use crate::graph::{DagDescription, FaoDag};
use crate::solver::{self, CglsOptions};
use crate::store::Direction;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

#[pyclass(name = "_FaoDag")]
#[derive(Debug)]
pub struct PyFaoDag {
    inner: FaoDag,
}

fn direction(forward: bool) -> Direction {
    Direction::from(forward)
}

#[pymethods]
impl PyFaoDag {
    #[staticmethod]
    pub fn from_json(text: &str) -> PyResult<Self> {
        let inner = DagDescription::from_json(text)
            .and_then(DagDescription::into_dag)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    #[staticmethod]
    pub fn from_path(path: &str) -> PyResult<Self> {
        let inner = DagDescription::from_path(path)
            .and_then(DagDescription::into_dag)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn to_json(&self) -> PyResult<String> {
        DagDescription::from_dag(&self.inner).to_json().map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    #[getter]
    pub fn input_len(&self) -> usize { self.inner.input_len() }
    #[getter]
    pub fn output_len(&self) -> usize { self.inner.output_len() }

    #[pyo3(signature = (data, forward = true))]
    pub fn copy_input(&mut self, data: Vec<f64>, forward: bool) -> PyResult<()> {
        self.inner.copy_input(&data, direction(forward)).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[pyo3(signature = (forward = true))]
    pub fn copy_output(&self, forward: bool) -> PyResult<Vec<f64>> {
        let len = if forward { self.inner.output_len() } else { self.inner.input_len() };
        let mut out = vec![0.0; len];
        self.inner.copy_output(&mut out, direction(forward)).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(out)
    }

    pub fn forward_eval(&mut self) -> PyResult<()> {
        self.inner.forward_eval().map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    pub fn adjoint_eval(&mut self) -> PyResult<()> {
        self.inner.adjoint_eval().map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Counts and mean seconds per call; averages are NaN before the first call.
    pub fn stats(&self) -> HashMap<&'static str, f64> {
        let stats = self.inner.stats();
        let avg = |d| stats.average(d).map_or(f64::NAN, |t| t.as_secs_f64());
        HashMap::from([
            ("forward_evals", stats.forward.evals as f64),
            ("adjoint_evals", stats.adjoint.evals as f64),
            ("avg_forward_eval_time", avg(Direction::Forward)),
            ("avg_adjoint_eval_time", avg(Direction::Adjoint)),
        ])
    }

    pub fn stats_report(&self) -> String {
        self.inner.stats().report().to_string()
    }

    /// Least-squares solve `min ||A x - b||`. Returns `(x, iterations, residual_norm, converged)`.
    #[pyo3(signature = (b, max_iters = 200, tol = 1e-10))]
    pub fn solve_least_squares(&mut self, b: Vec<f64>, max_iters: usize, tol: f64) -> PyResult<(Vec<f64>, usize, f64, bool)> {
        let options = CglsOptions { max_iters, tol };
        let result = solver::solve(&mut self.inner, &b, &options).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok((result.x, result.iterations, result.residual_norm, result.converged))
    }
}
