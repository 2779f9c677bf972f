//! Quality auditor.
//!
//! Evaluates every declared check against a table's audit relation and
//! reports all failures at once. A report with any failing check blocks
//! promotion for that table.

pub mod auditor;
pub mod checks;

pub use auditor::QualityAuditor;
pub use checks::{count_non_positive, count_nulls, count_repeated};
