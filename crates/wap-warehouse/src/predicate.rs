//! Row predicates for `delete_where`.
//!
//! Cells are compared through their canonical text (see
//! [`wap_common::any_to_text`]), so an integer `1` read from one file
//! matches the string `"1"` read from another. NULL never matches.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use polars::prelude::{AnyValue, DataFrame};
use wap_common::{any_to_i64, any_to_text, column_texts};
use wap_model::time::date_of_epoch_millis;

use crate::error::{Result, WarehouseError};

/// Canonical text of a row's key columns, in column order.
pub type KeyTuple = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = value`.
    Equals { column: String, value: String },
    /// Epoch-millisecond `time_column` falls on `date` (UTC).
    OnDate {
        time_column: String,
        date: NaiveDate,
    },
    /// The tuple of `columns` is one of `keys`.
    KeysIn {
        columns: Vec<String>,
        keys: HashSet<KeyTuple>,
    },
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn on_date(time_column: impl Into<String>, date: NaiveDate) -> Self {
        Self::OnDate {
            time_column: time_column.into(),
            date,
        }
    }

    /// Collect the key tuples of `columns` present in `frame`.
    ///
    /// Tuples with a NULL part are skipped; they can never match.
    pub fn keys_of(frame: &DataFrame, columns: &[String], relation: &str) -> Result<Self> {
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            parts.push(
                column_texts(frame, column).map_err(|_| WarehouseError::MissingColumn {
                    relation: relation.to_string(),
                    column: column.clone(),
                })?,
            );
        }
        let keys = (0..frame.height())
            .map(|idx| parts.iter().map(|values| values[idx].clone()).collect::<KeyTuple>())
            .filter(|key| key.iter().all(Option::is_some))
            .collect();
        Ok(Self::KeysIn {
            columns: columns.to_vec(),
            keys,
        })
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Equals { column, .. } => vec![column],
            Self::OnDate { time_column, .. } => vec![time_column],
            Self::KeysIn { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Evaluate the predicate for every row of `frame`.
    pub(crate) fn mask(&self, frame: &DataFrame, relation: &str) -> Result<Vec<bool>> {
        for column in self.columns() {
            if frame.column(column).is_err() {
                return Err(WarehouseError::MissingColumn {
                    relation: relation.to_string(),
                    column: column.to_string(),
                });
            }
        }

        let height = frame.height();
        let mask = match self {
            Self::Equals { column, value } => {
                let values = column_texts(frame, column)?;
                values
                    .iter()
                    .map(|cell| cell.as_deref() == Some(value.as_str()))
                    .collect()
            }
            Self::OnDate { time_column, date } => {
                let series = frame.column(time_column)?;
                (0..height)
                    .map(|idx| {
                        any_to_i64(series.get(idx).unwrap_or(AnyValue::Null))
                            .and_then(date_of_epoch_millis)
                            .is_some_and(|day| day == *date)
                    })
                    .collect()
            }
            Self::KeysIn { columns, keys } => {
                let mut series = Vec::with_capacity(columns.len());
                for column in columns {
                    series.push(frame.column(column)?);
                }
                (0..height)
                    .map(|idx| {
                        let key: KeyTuple = series
                            .iter()
                            .map(|col| any_to_text(col.get(idx).unwrap_or(AnyValue::Null)))
                            .collect();
                        key.iter().all(Option::is_some) && keys.contains(&key)
                    })
                    .collect()
            }
        };
        Ok(mask)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { column, value } => write!(f, "{column} = '{value}'"),
            Self::OnDate { time_column, date } => write!(f, "date({time_column}) = '{date}'"),
            Self::KeysIn { columns, keys } => {
                write!(f, "({}) in {} key(s)", columns.join(", "), keys.len())
            }
        }
    }
}
