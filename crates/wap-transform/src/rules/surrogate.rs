//! One row per distinct (natural id, display name) pair.
//!
//! A stable id that drifts across display names is not resolved to one
//! name. Each pair gets its own content-hash surrogate key, and the
//! remaining attributes are reduced with "most complete wins".

use std::cmp::Ordering;
use std::collections::HashMap;

use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};
use wap_common::DeterministicKey;
use wap_model::SurrogateIdentity;

use super::staging_name;
use crate::error::Result;
use crate::frame::{cell_texts, compare_cells, take_column, take_projection};

type PairKey = (Option<String>, Option<String>);

/// Row indices of each (natural id, name) group, in order of first
/// appearance.
fn group_rows(natural: &[Option<String>], names: &[Option<String>]) -> Vec<(PairKey, Vec<usize>)> {
    let mut position: HashMap<PairKey, usize> = HashMap::new();
    let mut groups: Vec<(PairKey, Vec<usize>)> = Vec::new();
    for (idx, pair) in natural.iter().cloned().zip(names.iter().cloned()).enumerate() {
        match position.get(&pair) {
            Some(pos) => groups[*pos].1.push(idx),
            None => {
                position.insert(pair.clone(), groups.len());
                groups.push((pair, vec![idx]));
            }
        }
    }
    groups
}

/// Row holding the maximal non-null value of a group. Falls back to the
/// group's first row, which is NULL too, when every value is NULL.
fn max_row(rows: &[usize], values: &[Option<String>]) -> usize {
    let mut best = rows[0];
    for &idx in &rows[1..] {
        if compare_cells(values[idx].as_deref(), values[best].as_deref()) == Ordering::Greater {
            best = idx;
        }
    }
    best
}

pub fn apply(rule: &SurrogateIdentity, source: &DataFrame) -> Result<DataFrame> {
    let relation = staging_name(&rule.source);
    let natural = cell_texts(source, &relation, &rule.natural_key.column)?;
    let names = cell_texts(source, &relation, &rule.display_name.column)?;
    let groups = group_rows(&natural, &names);

    let first_rows: Vec<usize> = groups.iter().map(|(_, rows)| rows[0]).collect();
    let keys: Vec<String> = groups
        .iter()
        .map(|((id, name), _)| {
            DeterministicKey::from_fields([id.as_deref(), name.as_deref()]).into_string()
        })
        .collect();

    let mut columns = vec![
        Series::new(rule.surrogate_column.as_str().into(), keys).into_column(),
        take_projection(source, &relation, &rule.natural_key, &first_rows)?,
        take_projection(source, &relation, &rule.display_name, &first_rows)?,
    ];
    for aggregate in &rule.aggregates {
        let values = cell_texts(source, &relation, &aggregate.column)?;
        let rows: Vec<usize> = groups
            .iter()
            .map(|(_, rows)| max_row(rows, &values))
            .collect();
        columns.push(take_column(
            source,
            &relation,
            &aggregate.column,
            aggregate.output_name(),
            &rows,
        )?);
    }
    Ok(DataFrame::new(columns)?)
}
