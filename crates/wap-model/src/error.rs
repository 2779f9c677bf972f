use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::AuditReport;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration rejected at startup, before any run begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("table {table}: merge load strategy requires primary_key_columns")]
    MergeWithoutPrimaryKey { table: String },

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("table {table}: transform reads undeclared staging relation {source_table}")]
    UnknownSource { table: String, source_table: String },

    #[error("table {table}: {context} column {column} is not produced by the transform")]
    UnknownColumn {
        table: String,
        column: String,
        context: &'static str,
    },

    #[error(
        "table {table}: partition_overwrite must use the run date column {expected}, got {column}"
    )]
    PartitionColumnMismatch {
        table: String,
        column: String,
        expected: String,
    },

    #[error("table {table}: run_date scope requires a transform time_column")]
    MissingTimeColumn { table: String },

    #[error("staging {table}: by_run_date deletion requires a time_column")]
    StagingMissingTimeColumn { table: String },

    #[error("table {table}: {message}")]
    InvalidTable { table: String, message: String },

    #[error("no fact table configured")]
    NoFactTable,

    #[error("max_retries {0} exceeds the limit of {limit}", limit = crate::config::MAX_RETRY_LIMIT)]
    RetryBoundTooLarge(u32),
}

/// Category of a run failure, persisted with the run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Ingestion,
    Transformation,
    QualityViolation,
    Promotion,
    Blocked,
    Internal,
}

/// Pipeline error, categorised for retry decisions.
#[derive(Debug, Error)]
pub enum WapError {
    /// Bulk load did not complete. Retryable, no visible effect.
    #[error("ingestion into staging.{table} failed: {source}")]
    Ingestion {
        table: String,
        #[source]
        source: BoxError,
    },

    /// Statement error while writing the audit relation. Retryable.
    #[error("transformation into audit.{table} failed: {source}")]
    Transformation {
        table: String,
        #[source]
        source: BoxError,
    },

    /// One or more quality checks failed. Never retried.
    #[error("{0}")]
    QualityViolation(Box<AuditReport>),

    /// Statement error during delete/insert to production. Retryable.
    #[error("promotion of audit.{table} to production ({strategy}) failed: {source}")]
    Promotion {
        table: String,
        strategy: String,
        #[source]
        source: BoxError,
    },

    #[error("run {run_id} is blocked: predecessor {predecessor} is {status}")]
    RunBlocked {
        run_id: String,
        predecessor: String,
        status: String,
    },

    /// A later date already has a run; rerunning this one would overwrite
    /// its merged or refreshed tables with older state.
    #[error("run {run_id} is out of order: later run {later} already exists")]
    RunOutOfOrder { run_id: String, later: String },

    #[error("run {active} is still active; only one run may be active at a time")]
    ActiveRun { active: String },

    #[error("run date {run_date} precedes the schedule start date {start_date}")]
    BeforeStartDate {
        run_date: String,
        start_date: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("run ledger error: {0}")]
    Ledger(#[source] BoxError),
}

impl WapError {
    pub fn ingestion(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Ingestion {
            table: table.into(),
            source: source.into(),
        }
    }

    pub fn transformation(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transformation {
            table: table.into(),
            source: source.into(),
        }
    }

    pub fn promotion(
        table: impl Into<String>,
        strategy: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Promotion {
            table: table.into(),
            strategy: strategy.into(),
            source: source.into(),
        }
    }

    pub fn ledger(source: impl Into<BoxError>) -> Self {
        Self::Ledger(source.into())
    }

    /// Returns `true` for failures a local retry may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Ingestion { .. } | Self::Transformation { .. } | Self::Promotion { .. }
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Ingestion { .. } => FailureKind::Ingestion,
            Self::Transformation { .. } => FailureKind::Transformation,
            Self::QualityViolation(_) => FailureKind::QualityViolation,
            Self::Promotion { .. } => FailureKind::Promotion,
            Self::RunBlocked { .. }
            | Self::RunOutOfOrder { .. }
            | Self::ActiveRun { .. }
            | Self::BeforeStartDate { .. } => FailureKind::Blocked,
            Self::Config(_) | Self::Ledger(_) => FailureKind::Internal,
        }
    }

    /// Destination or staging table the failure belongs to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Ingestion { table, .. }
            | Self::Transformation { table, .. }
            | Self::Promotion { table, .. } => Some(table),
            Self::QualityViolation(report) => Some(&report.table),
            _ => None,
        }
    }

    pub fn audit_report(&self) -> Option<&AuditReport> {
        match self {
            Self::QualityViolation(report) => Some(report),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(WapError::ingestion("staging_events", "copy failed").is_retryable());
        assert!(WapError::transformation("fct_songplays", "insert failed").is_retryable());
        assert!(WapError::promotion("dim_users", "merge", "delete failed").is_retryable());
        assert!(!WapError::QualityViolation(Box::default()).is_retryable());
        assert!(
            !WapError::ActiveRun {
                active: "scheduled__2018-11-01".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn error_carries_table() {
        let err = WapError::promotion("dim_users", "merge", "delete failed");
        assert_eq!(err.table(), Some("dim_users"));
        assert_eq!(err.kind(), FailureKind::Promotion);
        assert!(err.to_string().contains("merge"));
    }
}
