//! Run status and the persisted run record.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::CheckResult;
use crate::context::RunContext;
use crate::error::{FailureKind, WapError};

/// Lifecycle of one logical run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    StagingLoaded,
    PublishingUnits,
    Published,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// A run in one of these states holds the single active-run slot.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Any state may go back to `Pending` when the same date is
    /// triggered again.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::{Failed, Pending, Published, PublishingUnits, StagingLoaded, Succeeded};
        match (self, next) {
            (_, Pending) => true,
            (Pending, StagingLoaded)
            | (StagingLoaded, PublishingUnits)
            | (PublishingUnits, Published)
            | (Published, Succeeded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::StagingLoaded => "staging_loaded",
            RunStatus::PublishingUnits => "publishing_units",
            RunStatus::Published => "published",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended in [`RunStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub message: String,
    /// Every failing check, when the failure is a quality violation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_checks: Vec<CheckResult>,
}

impl From<&WapError> for RunFailure {
    fn from(error: &WapError) -> Self {
        Self {
            kind: error.kind(),
            table: error.table().map(str::to_string),
            message: error.to_string(),
            failed_checks: error
                .audit_report()
                .map(|report| report.failures().cloned().collect())
                .unwrap_or_default(),
        }
    }
}

/// Persisted state of one logical run, keyed by `run_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_date: NaiveDate,
    pub status: RunStatus,
    /// Number of times this date has been triggered.
    pub attempts: u32,
    /// Tables promoted by the current attempt, in order.
    #[serde(default)]
    pub completed_units: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn new(ctx: RunContext) -> Self {
        Self {
            run_id: ctx.run_id().to_string(),
            run_date: ctx.run_date(),
            status: RunStatus::Pending,
            attempts: 0,
            completed_units: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn context(&self) -> RunContext {
        RunContext::new(self.run_date)
    }
}
