//! Reading source files into frames.

use std::path::Path;

use polars::prelude::{
    Column, CsvReadOptions, DataFrame, DataType, IntoColumn, PolarsResult, SerReader, Series,
};

use crate::error::{IngestError, Result};

/// Normalizes a header: strips a BOM, collapses whitespace and lowercases.
///
/// The relational engine treats identifiers case-insensitively, so
/// `userId` in a source file lands in staging as `userid`.
pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Read one CSV file with a header row.
///
/// Zero-byte files read as an empty frame.
pub fn read_csv_frame(path: &Path) -> Result<DataFrame> {
    let to_parse_error = |err: &dyn std::fmt::Display| IngestError::CsvParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let size = std::fs::metadata(path)
        .map_err(|e| to_parse_error(&e))?
        .len();
    if size == 0 {
        return Ok(DataFrame::empty());
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| to_parse_error(&e))?
        .finish()
        .map_err(|e| to_parse_error(&e))?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| normalize_header(name.as_str()))
        .collect();
    df.set_column_names(names.iter().map(String::as_str))
        .map_err(|e| to_parse_error(&e))?;
    Ok(df)
}

/// Stack frames read from several files into one.
///
/// Columns are the union of all inputs in order of first appearance. A
/// column missing from a file is NULL for its rows; a column whose dtype
/// differs between files is widened to text.
pub fn stack_frames(frames: Vec<DataFrame>) -> PolarsResult<DataFrame> {
    let frames: Vec<DataFrame> = frames.into_iter().filter(|df| df.width() > 0).collect();
    if frames.len() <= 1 {
        return Ok(frames.into_iter().next().unwrap_or_else(DataFrame::empty));
    }

    let mut schema: Vec<(String, DataType)> = Vec::new();
    for df in &frames {
        for column in df.get_columns() {
            let name = column.name().as_str();
            match schema.iter_mut().find(|(known, _)| known == name) {
                Some((_, dtype)) => {
                    if dtype != column.dtype() {
                        *dtype = DataType::String;
                    }
                }
                None => schema.push((name.to_string(), column.dtype().clone())),
            }
        }
    }

    let mut stacked: Option<DataFrame> = None;
    for df in &frames {
        let height = df.height();
        let mut columns: Vec<Column> = Vec::with_capacity(schema.len());
        for (name, dtype) in &schema {
            let series = match df.column(name) {
                Ok(column) => column.as_materialized_series().cast(dtype)?,
                Err(_) => Series::full_null(name.as_str().into(), height, dtype),
            };
            columns.push(series.into_column());
        }
        let aligned = DataFrame::new(columns)?;
        match stacked.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&aligned)?;
            }
            None => stacked = Some(aligned),
        }
    }
    Ok(stacked.unwrap_or_else(DataFrame::empty))
}
