//! Runs a table's quality checks against its audit relation.

use polars::prelude::DataFrame;
use tracing::{info, trace, warn};
use wap_common::column_texts;
use wap_model::{AuditReport, CheckKind, CheckResult, RelationRef, RunContext, TableDescriptor};
use wap_warehouse::{Warehouse, WarehouseError};

use crate::checks::{count_non_positive, count_nulls, count_repeated};

/// Evaluates every declared check before deciding the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityAuditor;

impl QualityAuditor {
    pub fn new() -> Self {
        Self
    }

    /// Read the table's audit relation and check it.
    pub fn audit(
        &self,
        ctx: &RunContext,
        table: &TableDescriptor,
        warehouse: &dyn Warehouse,
    ) -> Result<AuditReport, WarehouseError> {
        let frame = warehouse.read(&RelationRef::audit(&table.name))?;
        let report = self.check(ctx, table, &frame);
        if report.passed() {
            info!(
                checks = report.results.len(),
                rows = report.rows_audited,
                "audit passed"
            );
        } else {
            for failure in report.failures() {
                warn!(
                    check = %failure.kind,
                    column = %failure.column,
                    violations = failure.violations,
                    "quality check failed"
                );
            }
        }
        Ok(report)
    }

    /// Evaluate every check against an audit frame.
    ///
    /// A column missing from the frame fails its check with every row
    /// counted as a violation.
    pub fn check(&self, ctx: &RunContext, table: &TableDescriptor, frame: &DataFrame) -> AuditReport {
        let rows = frame.height();
        let results = table
            .quality_checks
            .checks
            .iter()
            .map(|check| {
                let (violations, detail) = match column_texts(frame, &check.column) {
                    Ok(values) => {
                        let violations = match check.kind {
                            CheckKind::NotNull => count_nulls(&values),
                            CheckKind::Unique => count_repeated(&values),
                            CheckKind::PositiveValue => count_non_positive(&values),
                        };
                        (violations, None)
                    }
                    Err(_) => (
                        (rows as u64).max(1),
                        Some("column not present in audit relation".to_string()),
                    ),
                };
                trace!(check = %check.kind, column = %check.column, violations, "check evaluated");
                CheckResult {
                    kind: check.kind,
                    column: check.column.clone(),
                    violations,
                    detail,
                }
            })
            .collect();

        AuditReport {
            table: table.name.clone(),
            run_date: ctx.ds(),
            rows_audited: rows,
            results,
        }
    }
}
