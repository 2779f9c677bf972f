//! Violation counts for each check kind.
//!
//! Counts run over the canonical text of a column, so a value reads the
//! same here as it does to the join and key logic.

use std::collections::HashSet;

use wap_common::parse_f64;

/// Rows where the value is absent.
pub fn count_nulls(values: &[Option<String>]) -> u64 {
    values.iter().filter(|value| value.is_none()).count() as u64
}

/// Non-null rows minus distinct non-null values.
///
/// NULLs are left to the not-null check.
pub fn count_repeated(values: &[Option<String>]) -> u64 {
    let present: Vec<&str> = values.iter().filter_map(|value| value.as_deref()).collect();
    let distinct: HashSet<&str> = present.iter().copied().collect();
    (present.len() - distinct.len()) as u64
}

/// Non-null rows whose value is zero, negative or not a number.
pub fn count_non_positive(values: &[Option<String>]) -> u64 {
    values
        .iter()
        .flatten()
        .filter(|value| parse_f64(value).is_none_or(|number| number <= 0.0))
        .count() as u64
}
