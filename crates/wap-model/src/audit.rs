use std::fmt;

use serde::{Deserialize, Serialize};

use crate::table::CheckKind;

/// Outcome of one declared check against an audit relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub column: String,
    /// Rows violating the check; the check fails iff this is nonzero.
    pub violations: u64,
    /// Extra context, e.g. when the column is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    pub fn failed(&self) -> bool {
        self.violations > 0
    }
}

/// Every check evaluated for one table in one audit pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub table: String,
    pub run_date: String,
    pub rows_audited: usize,
    pub results: Vec<CheckResult>,
}

impl AuditReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| result.failed())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn passed(&self) -> bool {
        self.failure_count() == 0
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(
                f,
                "audit.{} passed {} check(s) for {}",
                self.table,
                self.results.len(),
                self.run_date
            );
        }
        write!(
            f,
            "audit.{} failed {} of {} check(s) for {}:",
            self.table,
            self.failure_count(),
            self.results.len(),
            self.run_date
        )?;
        for failure in self.failures() {
            write!(
                f,
                " {}({})={}",
                failure.kind, failure.column, failure.violations
            )?;
            if let Some(detail) = &failure.detail {
                write!(f, " [{detail}]")?;
            }
            f.write_str(";")?;
        }
        Ok(())
    }
}
