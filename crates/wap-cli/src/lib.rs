//! CLI library components for the `wap` binary.

pub mod logging;
pub mod summary;
