//! One module per transform rule kind.
//!
//! Each rule receives its source rows already filtered and scoped to the
//! run, and returns the audit rows without the run-date column.

pub mod join;
pub mod ranked;
pub mod surrogate;
pub mod time_parts;

pub(crate) fn staging_name(table: &str) -> String {
    format!("staging.{table}")
}
