//! Identifiers, shapes and the edge registry shared by every other module.
pub mod registry;
pub mod types;

pub use registry::{Edge, EdgeRegistry};
pub use types::{Direction, EdgeId, NodeId, Shape};
