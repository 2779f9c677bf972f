//! Results returned by the control surface.

use wap_ingest::LoadSummary;
use wap_model::{AuditReport, RunRecord, WapError};
use wap_publish::PromotionSummary;

/// One completed WAP unit.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub table: String,
    pub rows_written: usize,
    pub audit: AuditReport,
    pub promotion: PromotionSummary,
}

/// A run that reached `Succeeded`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub record: RunRecord,
    pub staging: Vec<LoadSummary>,
    pub units: Vec<UnitReport>,
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    /// Runs that succeeded, in date order.
    pub runs: Vec<RunReport>,
    /// The error that stopped the backfill, if any.
    pub error: Option<WapError>,
}

impl BackfillReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
