//! Transformer.
//!
//! Reads staging relations, applies one table's transform rule and writes
//! the result to that table's audit relation. Every rule stamps the
//! run-date column so production partitions can be addressed by run.

pub mod error;
pub mod frame;
pub mod rules;
pub mod transformer;

pub use error::{Result, TransformError};
pub use transformer::Transformer;
