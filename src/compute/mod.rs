//! Numeric kernels and the data movement around node evaluation.
pub mod batch;
pub mod kernel;
pub mod propagate;
