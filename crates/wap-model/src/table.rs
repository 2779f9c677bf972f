//! Static per-table configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules::TransformRule;

/// Position of a table in the WAP unit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRole {
    /// Published first.
    Fact,
    Dimension,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRole::Fact => f.write_str("fact"),
            TableRole::Dimension => f.write_str("dimension"),
        }
    }
}

/// How validated audit rows replace or merge into production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStrategy {
    /// Insert all audit rows as-is.
    Append,
    /// Delete the run's partition, then insert.
    PartitionOverwrite { partition_column: String },
    /// Truncate production, then insert.
    FullRefresh,
    /// Delete production rows whose key appears in audit, then insert.
    Merge { primary_key_columns: Vec<String> },
}

impl LoadStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LoadStrategy::Append => "append",
            LoadStrategy::PartitionOverwrite { .. } => "partition_overwrite",
            LoadStrategy::FullRefresh => "full_refresh",
            LoadStrategy::Merge { .. } => "merge",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStrategy::PartitionOverwrite { partition_column } => {
                write!(f, "partition_overwrite({partition_column})")
            }
            LoadStrategy::Merge {
                primary_key_columns,
            } => write!(f, "merge({})", primary_key_columns.join(", ")),
            other => f.write_str(other.name()),
        }
    }
}

/// Which staging rows a table's transformation sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformScope {
    /// Only rows whose time column falls on the run date.
    RunDate,
    /// The whole staging snapshot, recomputed every run.
    #[default]
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    NotNull,
    Unique,
    PositiveValue,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::NotNull => f.write_str("not_null"),
            CheckKind::Unique => f.write_str("unique"),
            CheckKind::PositiveValue => f.write_str("positive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub kind: CheckKind,
    pub column: String,
}

/// Declared checks for one table, evaluated in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCheckSpec {
    pub checks: Vec<QualityCheck>,
}

impl QualityCheckSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(mut self, kind: CheckKind, column: impl Into<String>) -> Self {
        self.checks.push(QualityCheck {
            kind,
            column: column.into(),
        });
        self
    }

    pub fn not_null(self, column: impl Into<String>) -> Self {
        self.with_check(CheckKind::NotNull, column)
    }

    pub fn unique(self, column: impl Into<String>) -> Self {
        self.with_check(CheckKind::Unique, column)
    }

    pub fn positive(self, column: impl Into<String>) -> Self {
        self.with_check(CheckKind::PositiveValue, column)
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Validated configuration for one destination table.
///
/// Built once at startup by [`crate::PipelineConfig`] and immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub role: TableRole,
    pub load_strategy: LoadStrategy,
    pub primary_key_columns: Vec<String>,
    pub scope: TransformScope,
    pub quality_checks: QualityCheckSpec,
    pub transform: TransformRule,
}

impl TableDescriptor {
    pub fn is_incremental(&self) -> bool {
        self.scope == TransformScope::RunDate
    }
}
