//! Fact rows from an exact event/catalog join.
//!
//! Events with no exact catalog match are dropped. They lack the catalog
//! attributes the fact table needs, so excluding them is a data-quality
//! policy rather than a lookup miss.

use std::collections::{HashMap, HashSet};

use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};
use tracing::debug;
use wap_common::DeterministicKey;
use wap_model::time::format_event_time;
use wap_model::{EventCatalogJoin, JoinSide};

use super::staging_name;
use crate::error::Result;
use crate::frame::{cell_millis, cell_texts, filter_rows, take_projection};

/// Canonical text of a row's match columns. `None` when any part is NULL,
/// since NULL never matches.
fn match_tuples(df: &DataFrame, relation: &str, columns: &[&str]) -> Result<Vec<Option<Vec<String>>>> {
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        parts.push(cell_texts(df, relation, column)?);
    }
    Ok((0..df.height())
        .map(|idx| {
            parts
                .iter()
                .map(|values| values[idx].clone())
                .collect::<Option<Vec<String>>>()
        })
        .collect())
}

pub fn apply(rule: &EventCatalogJoin, events: &DataFrame, catalog: &DataFrame) -> Result<DataFrame> {
    let events_name = staging_name(&rule.events);
    let catalog_name = staging_name(&rule.catalog);

    let event_columns: Vec<&str> = rule.match_columns.iter().map(|m| m.event.as_str()).collect();
    let catalog_columns: Vec<&str> = rule
        .match_columns
        .iter()
        .map(|m| m.catalog.as_str())
        .collect();

    let mut catalog_index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (idx, tuple) in match_tuples(catalog, &catalog_name, &catalog_columns)?
        .into_iter()
        .enumerate()
    {
        if let Some(tuple) = tuple {
            catalog_index.entry(tuple).or_default().push(idx);
        }
    }

    let mut event_rows = Vec::new();
    let mut catalog_rows = Vec::new();
    for (idx, tuple) in match_tuples(events, &events_name, &event_columns)?
        .into_iter()
        .enumerate()
    {
        let Some(tuple) = tuple else { continue };
        if let Some(matches) = catalog_index.get(&tuple) {
            for catalog_idx in matches {
                event_rows.push(idx);
                catalog_rows.push(*catalog_idx);
            }
        }
    }
    debug!(
        events = events.height(),
        matched = event_rows.len(),
        "joined events to catalog"
    );

    let millis = cell_millis(events, &events_name, &rule.time_column)?;
    let event_times: Vec<Option<String>> = event_rows
        .iter()
        .map(|idx| millis[*idx].and_then(format_event_time))
        .collect();

    let mut columns: Vec<Column> = Vec::with_capacity(rule.columns.len() + 1);
    columns.push(Series::new(rule.time_alias.as_str().into(), event_times).into_column());
    for projection in &rule.columns {
        let column = match projection.from {
            JoinSide::Event => {
                take_projection(events, &events_name, &projection.projection, &event_rows)?
            }
            JoinSide::Catalog => {
                take_projection(catalog, &catalog_name, &projection.projection, &catalog_rows)?
            }
        };
        columns.push(column);
    }
    let joined = DataFrame::new(columns)?;

    // Set semantics over the projected row, before key assignment.
    let names: Vec<String> = joined
        .get_column_names()
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut texts = Vec::with_capacity(names.len());
    for name in &names {
        texts.push(cell_texts(&joined, "audit", name)?);
    }
    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    let keep: Vec<bool> = (0..joined.height())
        .map(|idx| seen.insert(texts.iter().map(|values| values[idx].clone()).collect()))
        .collect();
    let mut distinct = filter_rows(&joined, &keep)?;

    let mut key_parts = Vec::with_capacity(rule.key_fields.len());
    for field in &rule.key_fields {
        key_parts.push(cell_texts(&distinct, "audit", field)?);
    }
    let keys: Vec<String> = (0..distinct.height())
        .map(|idx| {
            DeterministicKey::from_fields(key_parts.iter().map(|values| values[idx].as_deref()))
                .into_string()
        })
        .collect();
    distinct.insert_column(0, Series::new(rule.key_column.as_str().into(), keys))?;
    Ok(distinct)
}
