//! The run state machine.

use std::time::Instant;

use chrono::{Days, NaiveDate, Utc};
use tracing::{error, info, info_span, warn};
use wap_ingest::{LoadSummary, StagingLoader};
use wap_model::{
    PipelineConfig, Result, RunContext, RunFailure, RunRecord, RunStatus, TableDescriptor,
    WapError,
};
use wap_publish::Publisher;
use wap_transform::Transformer;
use wap_validate::QualityAuditor;
use wap_warehouse::Warehouse;

use crate::ledger::RunLedger;
use crate::report::{BackfillReport, RunReport, UnitReport};
use crate::retry::RetryPolicy;

/// Drives logical runs through load, WAP units and publication.
///
/// Steps run strictly in sequence on the calling thread. The ledger is the
/// only record of run status; it enforces the single active run and the
/// predecessor dependency.
pub struct PipelineOrchestrator<W, L, R> {
    config: PipelineConfig,
    warehouse: W,
    loader: L,
    ledger: R,
    retry: RetryPolicy,
    transformer: Transformer,
    auditor: QualityAuditor,
    publisher: Publisher,
}

impl<W: Warehouse, L: StagingLoader, R: RunLedger> PipelineOrchestrator<W, L, R> {
    pub fn new(config: PipelineConfig, warehouse: W, loader: L, ledger: R) -> Self {
        let retry = RetryPolicy::from(&config.schedule);
        let transformer = Transformer::new(config.warehouse.run_date_column.clone());
        Self {
            config,
            warehouse,
            loader,
            ledger,
            retry,
            transformer,
            auditor: QualityAuditor::new(),
            publisher: Publisher::new(),
        }
    }

    /// Override the retry policy taken from the schedule.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn warehouse_mut(&mut self) -> &mut W {
        &mut self.warehouse
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn ledger(&self) -> &R {
        &self.ledger
    }

    /// Current record for a run, if it was ever triggered.
    pub fn inspect(&self, run_id: &str) -> Result<Option<RunRecord>> {
        self.ledger.get(run_id).map_err(WapError::ledger)
    }

    /// Every run known to the ledger, in date order.
    pub fn history(&self) -> Result<Vec<RunRecord>> {
        self.ledger.records().map_err(WapError::ledger)
    }

    /// Execute the logical run for `run_date`.
    ///
    /// Rejected without touching any relation when the date precedes the
    /// schedule or another run is active. With `depends_on_past` it is also
    /// rejected when a later date already has a run, when any earlier run
    /// failed, or when the predecessor has not succeeded. Otherwise the run's outcome is recorded in the ledger
    /// before this returns.
    pub fn trigger(&mut self, run_date: NaiveDate) -> Result<RunReport> {
        let ctx = RunContext::new(run_date);
        self.admit(&ctx)?;

        let mut record = self
            .ledger
            .get(ctx.run_id())
            .map_err(WapError::ledger)?
            .unwrap_or_else(|| RunRecord::new(ctx.clone()));
        record.status = RunStatus::Pending;
        record.attempts += 1;
        record.completed_units.clear();
        record.failure = None;
        record.started_at = Utc::now();
        record.finished_at = None;
        self.save(&record)?;

        let span = info_span!("run", run_date = %ctx.ds());
        let _guard = span.enter();
        let started = Instant::now();
        info!(run_id = ctx.run_id(), attempt = record.attempts, "run started");

        match self.execute(&ctx, &mut record) {
            Ok((staging, units)) => {
                advance(&mut record, RunStatus::Succeeded)?;
                record.finished_at = Some(Utc::now());
                self.save(&record)?;
                info!(
                    units = units.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "run succeeded"
                );
                Ok(RunReport {
                    record,
                    staging,
                    units,
                })
            }
            Err(err) => {
                error!(
                    kind = ?err.kind(),
                    table = err.table(),
                    error = %err,
                    "run failed"
                );
                advance(&mut record, RunStatus::Failed)?;
                record.failure = Some(RunFailure::from(&err));
                record.finished_at = Some(Utc::now());
                self.save(&record)?;
                Err(err)
            }
        }
    }

    /// Run every date from `start` to `end` inclusive, ascending, stopping
    /// at the first run that fails or is rejected.
    ///
    /// `on_run` is called with each date before it starts.
    pub fn backfill(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        mut on_run: impl FnMut(&RunContext),
    ) -> BackfillReport {
        let mut report = BackfillReport::default();
        let mut date = start;
        while date <= end {
            let ctx = RunContext::new(date);
            on_run(&ctx);
            match self.trigger(date) {
                Ok(run) => report.runs.push(run),
                Err(err) => {
                    warn!(run_id = ctx.run_id(), error = %err, "backfill stopped");
                    report.error = Some(err);
                    break;
                }
            }
            let Some(next) = date.checked_add_days(Days::new(1)) else {
                break;
            };
            date = next;
        }
        report
    }

    fn admit(&self, ctx: &RunContext) -> Result<()> {
        let start_date = self.config.schedule.start_date;
        if ctx.run_date() < start_date {
            return Err(WapError::BeforeStartDate {
                run_date: ctx.ds(),
                start_date: start_date.to_string(),
            });
        }

        // A record still active for this same date means an earlier attempt
        // was aborted mid-run; re-triggering it is how that run recovers.
        if let Some(active) = self.ledger.active().map_err(WapError::ledger)?
            && active.run_id != ctx.run_id()
        {
            return Err(WapError::ActiveRun {
                active: active.run_id,
            });
        }

        if !self.config.schedule.depends_on_past {
            return Ok(());
        }

        let records = self.ledger.records().map_err(WapError::ledger)?;
        if let Some(later) = records
            .iter()
            .find(|record| record.run_date > ctx.run_date())
        {
            return Err(WapError::RunOutOfOrder {
                run_id: ctx.run_id().to_string(),
                later: later.run_id.clone(),
            });
        }
        if let Some(failed) = records
            .iter()
            .find(|record| record.run_date < ctx.run_date() && record.status == RunStatus::Failed)
        {
            return Err(WapError::RunBlocked {
                run_id: ctx.run_id().to_string(),
                predecessor: failed.run_id.clone(),
                status: failed.status.as_str().to_string(),
            });
        }

        if ctx.run_date() > start_date {
            let Some(previous) = ctx.run_date().checked_sub_days(Days::new(1)) else {
                return Ok(());
            };
            let predecessor = RunContext::run_id_for(previous);
            let status = self
                .ledger
                .get(&predecessor)
                .map_err(WapError::ledger)?
                .map(|record| record.status);
            if status != Some(RunStatus::Succeeded) {
                return Err(WapError::RunBlocked {
                    run_id: ctx.run_id().to_string(),
                    predecessor,
                    status: status.map_or("missing", RunStatus::as_str).to_string(),
                });
            }
        }
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &RunContext,
        record: &mut RunRecord,
    ) -> Result<(Vec<LoadSummary>, Vec<UnitReport>)> {
        let mut staging = Vec::with_capacity(self.config.staging.len());
        for descriptor in &self.config.staging {
            let loader = &self.loader;
            let warehouse = &mut self.warehouse;
            let summary = self.retry.run("stage", || {
                loader
                    .load(ctx, descriptor, &mut *warehouse)
                    .map_err(|e| WapError::ingestion(&descriptor.table, e))
            })?;
            staging.push(summary);
        }
        advance(record, RunStatus::StagingLoaded)?;
        self.save(record)?;

        advance(record, RunStatus::PublishingUnits)?;
        self.save(record)?;

        let units: Vec<TableDescriptor> = self.config.wap_units().into_iter().cloned().collect();
        let mut reports = Vec::with_capacity(units.len());
        for table in &units {
            let report = self.wap_unit(ctx, table)?;
            record.completed_units.push(table.name.clone());
            self.save(record)?;
            reports.push(report);
        }

        advance(record, RunStatus::Published)?;
        self.save(record)?;
        Ok((staging, reports))
    }

    /// Write, audit, publish one table. Each step starts only after the
    /// previous one completed.
    fn wap_unit(&mut self, ctx: &RunContext, table: &TableDescriptor) -> Result<UnitReport> {
        let span = info_span!("wap_unit", table = %table.name);
        let _guard = span.enter();

        let rows_written = {
            let _step = info_span!("write").entered();
            let transformer = &self.transformer;
            let warehouse = &mut self.warehouse;
            self.retry.run("write", || {
                transformer
                    .write_audit(ctx, table, &mut *warehouse)
                    .map_err(|e| WapError::transformation(&table.name, e))
            })?
        };

        let audit = {
            let _step = info_span!("audit").entered();
            let auditor = &self.auditor;
            let warehouse = &self.warehouse;
            let report = self.retry.run("audit", || {
                auditor
                    .audit(ctx, table, warehouse)
                    .map_err(|e| WapError::transformation(&table.name, e))
            })?;
            if !report.passed() {
                return Err(WapError::QualityViolation(Box::new(report)));
            }
            report
        };

        let promotion = {
            let _step = info_span!("publish", strategy = %table.load_strategy).entered();
            let publisher = &self.publisher;
            let warehouse = &mut self.warehouse;
            self.retry.run("publish", || {
                publisher.promote(ctx, table, &mut *warehouse).map_err(|e| {
                    WapError::promotion(&table.name, table.load_strategy.name(), e)
                })
            })?
        };

        Ok(UnitReport {
            table: table.name.clone(),
            rows_written,
            audit,
            promotion,
        })
    }

    fn save(&mut self, record: &RunRecord) -> Result<()> {
        self.ledger.put(record).map_err(WapError::ledger)
    }
}

fn advance(record: &mut RunRecord, next: RunStatus) -> Result<()> {
    if !record.status.can_transition_to(next) {
        return Err(WapError::ledger(format!(
            "run {} cannot move from {} to {}",
            record.run_id, record.status, next
        )));
    }
    record.status = next;
    Ok(())
}
