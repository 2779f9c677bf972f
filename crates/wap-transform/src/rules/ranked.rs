//! Keep the top-ranked row per natural key.
//!
//! Serves both current-state dimensions (rank by recency) and catalog
//! dimensions with conflicting records (rank by a completeness field).

use std::cmp::Ordering;
use std::collections::HashMap;

use polars::prelude::DataFrame;
use wap_model::RankedDedup;

use super::staging_name;
use crate::error::Result;
use crate::frame::{cell_texts, compare_cells, take_projection};

/// Row index of the winner for each key, in order of first appearance.
///
/// Ranks by `order` descending with NULLs last; on a tie the earlier row
/// wins. A NULL key is a group of its own.
pub fn winners(keys: &[Option<String>], order: &[Option<String>]) -> Vec<usize> {
    let mut best: HashMap<Option<&str>, usize> = HashMap::new();
    let mut first_seen: Vec<Option<&str>> = Vec::new();
    for (idx, key) in keys.iter().enumerate() {
        let key = key.as_deref();
        match best.get_mut(&key) {
            Some(current) => {
                if compare_cells(order[idx].as_deref(), order[*current].as_deref())
                    == Ordering::Greater
                {
                    *current = idx;
                }
            }
            None => {
                best.insert(key, idx);
                first_seen.push(key);
            }
        }
    }
    first_seen.iter().map(|key| best[key]).collect()
}

pub fn apply(rule: &RankedDedup, source: &DataFrame) -> Result<DataFrame> {
    let relation = staging_name(&rule.source);
    let keys = cell_texts(source, &relation, &rule.partition_by)?;
    let order = cell_texts(source, &relation, &rule.order_by)?;
    let mut rows = winners(&keys, &order);
    rows.sort_unstable();

    let mut columns = Vec::with_capacity(rule.columns.len());
    for projection in &rule.columns {
        columns.push(take_projection(source, &relation, projection, &rows)?);
    }
    Ok(DataFrame::new(columns)?)
}
