//! Row-level helpers shared by the transform rules.

use std::cmp::Ordering;

use polars::prelude::{
    BooleanChunked, Column, DataFrame, DataType, IdxCa, IdxSize, IntoColumn, NewChunkedArray,
    Series,
};
use wap_common::{any_to_i64, column_texts, parse_f64};
use wap_model::{ColumnFilter, Projection, RunContext};

use crate::error::{Result, TransformError};

/// Fails with [`TransformError::MissingColumn`] when `column` is absent.
pub fn require_column<'a>(df: &'a DataFrame, relation: &str, column: &str) -> Result<&'a Column> {
    df.column(column)
        .map_err(|_| TransformError::MissingColumn {
            relation: relation.to_string(),
            column: column.to_string(),
        })
}

/// Canonical text of every cell in `column`.
pub fn cell_texts(df: &DataFrame, relation: &str, column: &str) -> Result<Vec<Option<String>>> {
    require_column(df, relation, column)?;
    Ok(column_texts(df, column)?)
}

/// Epoch milliseconds of every cell in `column`.
pub fn cell_millis(df: &DataFrame, relation: &str, column: &str) -> Result<Vec<Option<i64>>> {
    let column = require_column(df, relation, column)?;
    Ok((0..df.height())
        .map(|idx| column.get(idx).ok().and_then(any_to_i64))
        .collect())
}

pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Rows of a source that a rule may see.
///
/// Applies the equality filter, then, when `run_date` is given, keeps
/// only rows whose epoch-millisecond `time_column` falls on that day.
pub fn scope_rows(
    df: &DataFrame,
    relation: &str,
    filter: Option<&ColumnFilter>,
    time_column: Option<&str>,
    run_date: Option<&RunContext>,
) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];
    if let Some(filter) = filter {
        let values = cell_texts(df, relation, &filter.column)?;
        for (kept, value) in keep.iter_mut().zip(values) {
            *kept &= value.as_deref() == Some(filter.equals.as_str());
        }
    }
    if let (Some(time_column), Some(ctx)) = (time_column, run_date) {
        let millis = cell_millis(df, relation, time_column)?;
        for (kept, value) in keep.iter_mut().zip(millis) {
            *kept &= value.is_some_and(|ms| ctx.contains_epoch_millis(ms));
        }
    }
    if keep.iter().all(|kept| *kept) {
        return Ok(df.clone());
    }
    filter_rows(df, &keep)
}

fn index_array(indices: &[usize]) -> IdxCa {
    let indices: Vec<IdxSize> = indices.iter().map(|idx| *idx as IdxSize).collect();
    IdxCa::from_vec("idx".into(), indices)
}

/// Gather `column` at `indices`, renamed to `output_name`. Keeps the
/// source dtype.
pub fn take_column(
    df: &DataFrame,
    relation: &str,
    column: &str,
    output_name: &str,
    indices: &[usize],
) -> Result<Column> {
    let source = require_column(df, relation, column)?;
    let taken = source
        .as_materialized_series()
        .take(&index_array(indices))?
        .with_name(output_name.into());
    Ok(taken.into_column())
}

pub fn take_projection(
    df: &DataFrame,
    relation: &str,
    projection: &Projection,
    indices: &[usize],
) -> Result<Column> {
    take_column(
        df,
        relation,
        &projection.column,
        projection.output_name(),
        indices,
    )
}

/// A zero-row frame with text columns, for runs where a source is empty.
pub fn empty_frame(columns: &[String]) -> Result<DataFrame> {
    let columns = columns
        .iter()
        .map(|name| Series::new_empty(name.as_str().into(), &DataType::String).into_column())
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Order two cells: numerically when both parse as numbers, as text
/// otherwise. NULL sorts below every value.
pub fn compare_cells(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (parse_f64(a), parse_f64(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.cmp(b),
        },
    }
}
