//! Loading staging relations.

use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::{AnyValue, BooleanChunked, DataFrame, NewChunkedArray};
use tracing::{debug, info, info_span, warn};
use wap_common::any_to_i64;
use wap_model::time::date_of_epoch_millis;
use wap_model::{DeletionMode, RelationRef, RunContext, StagingDescriptor};
use wap_warehouse::{Predicate, Warehouse};

use crate::discovery::resolve_sources;
use crate::error::{IngestError, Result};
use crate::frames::{read_csv_frame, stack_frames};

/// What one staging load did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: String,
    pub files: usize,
    pub rows_deleted: usize,
    pub rows_loaded: usize,
}

/// Bulk-loads one run's raw records into a staging relation.
pub trait StagingLoader {
    /// Clear the run's slice of the staging relation, then insert.
    ///
    /// On error the relation is left in its pre-run state or with the
    /// run's slice removed; never partially loaded.
    fn load(
        &self,
        ctx: &RunContext,
        staging: &StagingDescriptor,
        warehouse: &mut dyn Warehouse,
    ) -> Result<LoadSummary>;
}

/// Loads CSV files resolved from a locator template under a data root.
#[derive(Debug, Clone)]
pub struct FileStagingLoader {
    data_root: PathBuf,
}

impl FileStagingLoader {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Path a staging relation loads from for one run.
    pub fn source_path(&self, ctx: &RunContext, staging: &StagingDescriptor) -> PathBuf {
        self.data_root
            .join(ctx.render_template(&staging.source_locator))
    }
}

impl StagingLoader for FileStagingLoader {
    fn load(
        &self,
        ctx: &RunContext,
        staging: &StagingDescriptor,
        warehouse: &mut dyn Warehouse,
    ) -> Result<LoadSummary> {
        let span = info_span!("stage", table = %staging.table);
        let _guard = span.enter();
        let started = Instant::now();

        let source = self.source_path(ctx, staging);
        let files = resolve_sources(&source)?;
        if files.is_empty() {
            match staging.deletion_mode {
                DeletionMode::ByRunDate => {
                    warn!(source = %source.display(), "no source files for run date; loading zero rows");
                }
                DeletionMode::FullTruncate => {
                    return Err(IngestError::SourceNotFound { path: source });
                }
            }
        }

        // Read everything first so a parse failure leaves staging untouched.
        let mut frames = Vec::with_capacity(files.len());
        for path in &files {
            let frame = read_csv_frame(path)?;
            debug!(path = %path.display(), rows = frame.height(), "read source file");
            frames.push(frame);
        }
        let mut rows = stack_frames(frames)?;

        let relation = RelationRef::staging(&staging.table);
        let rows_deleted = match staging.deletion_mode {
            DeletionMode::ByRunDate => {
                let time_column =
                    staging
                        .time_column
                        .as_deref()
                        .ok_or_else(|| IngestError::InvalidStaging {
                            table: staging.table.clone(),
                            message: "by_run_date deletion requires a time_column".to_string(),
                        })?;
                rows = keep_run_date(&rows, time_column, ctx, &staging.table)?;
                warehouse.delete_where(&relation, &Predicate::on_date(time_column, ctx.run_date()))?
            }
            DeletionMode::FullTruncate => warehouse.truncate(&relation)?,
        };

        let rows_loaded = if rows.width() > 0 {
            warehouse.insert(&relation, &rows)?
        } else {
            0
        };

        info!(
            files = files.len(),
            rows_deleted,
            rows = rows_loaded,
            duration_ms = started.elapsed().as_millis() as u64,
            "staging loaded"
        );
        Ok(LoadSummary {
            table: staging.table.clone(),
            files: files.len(),
            rows_deleted,
            rows_loaded,
        })
    }
}

/// Drop rows that fall outside the run date so a rerun replaces exactly
/// what it loaded.
fn keep_run_date(
    rows: &DataFrame,
    time_column: &str,
    ctx: &RunContext,
    table: &str,
) -> Result<DataFrame> {
    if rows.width() == 0 {
        return Ok(rows.clone());
    }
    let column = rows
        .column(time_column)
        .map_err(|_| IngestError::InvalidStaging {
            table: table.to_string(),
            message: format!("source has no time column {time_column}"),
        })?;
    let keep: Vec<bool> = (0..rows.height())
        .map(|idx| {
            any_to_i64(column.get(idx).unwrap_or(AnyValue::Null))
                .and_then(date_of_epoch_millis)
                .is_some_and(|day| day == ctx.run_date())
        })
        .collect();
    let outside = keep.iter().filter(|kept| !**kept).count();
    if outside == 0 {
        return Ok(rows.clone());
    }
    warn!(rows = outside, "dropping source rows outside the run date");
    let mask = BooleanChunked::from_slice("run_date".into(), &keep);
    Ok(rows.filter(&mask)?)
}
