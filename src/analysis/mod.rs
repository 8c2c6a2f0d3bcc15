//! Whole-graph analyses: scheduling, structural validation and timing.
pub mod telemetry;
pub mod topology;
pub mod validation;
