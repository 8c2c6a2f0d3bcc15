//! The operator graph: nodes, operators, wiring and the evaluation driver.
pub mod builder;
pub mod dag;
pub mod description;
pub mod error;
pub mod node;
pub mod operator;

pub use builder::DagBuilder;
pub use dag::FaoDag;
pub use description::{DagDescription, DescriptionError};
pub use error::{BufferRole, DagError};
pub use node::{Node, OffsetMap};
pub use operator::{CsrMatrix, DenseMatrix, LinearOp, Operator, Ports};
