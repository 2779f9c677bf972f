//! Writes one table's audit relation from staging.

use std::time::Instant;

use polars::prelude::{DataFrame, NamedFrom, Series};
use tracing::{debug, info};
use wap_model::{RelationRef, RunContext, TableDescriptor, TransformRule, TransformScope};
use wap_warehouse::Warehouse;

use crate::error::Result;
use crate::frame::{empty_frame, scope_rows};
use crate::rules::{join, ranked, staging_name, surrogate, time_parts};

#[derive(Debug, Clone)]
pub struct Transformer {
    run_date_column: String,
}

impl Transformer {
    pub fn new(run_date_column: impl Into<String>) -> Self {
        Self {
            run_date_column: run_date_column.into(),
        }
    }

    pub fn run_date_column(&self) -> &str {
        &self.run_date_column
    }

    /// Replace the table's audit relation with this run's rows.
    ///
    /// The audit relation is truncated first, so a retried attempt never
    /// sees rows from an earlier partial write. Returns the rows written.
    pub fn write_audit(
        &self,
        ctx: &RunContext,
        table: &TableDescriptor,
        warehouse: &mut dyn Warehouse,
    ) -> Result<usize> {
        let started = Instant::now();
        let audit = RelationRef::audit(&table.name);
        let cleared = warehouse.truncate(&audit)?;
        if cleared > 0 {
            debug!(rows = cleared, "cleared stale audit rows");
        }

        let rows = self.build(ctx, table, warehouse)?;
        let written = warehouse.insert(&audit, &rows)?;
        info!(
            rule = table.transform.kind_name(),
            rows = written,
            duration_ms = started.elapsed().as_millis() as u64,
            "audit written"
        );
        Ok(written)
    }

    /// Compute the audit rows for a table without writing them.
    pub fn build(
        &self,
        ctx: &RunContext,
        table: &TableDescriptor,
        warehouse: &dyn Warehouse,
    ) -> Result<DataFrame> {
        let run_date = (table.scope == TransformScope::RunDate).then_some(ctx);

        let mut sources = Vec::new();
        for source in table.transform.sources() {
            sources.push(warehouse.read(&RelationRef::staging(source))?);
        }
        if sources.iter().any(|frame| frame.width() == 0) {
            debug!("a source relation has never been loaded; writing no rows");
            return empty_frame(&table.transform.output_columns(&self.run_date_column));
        }

        let mut rows = match &table.transform {
            TransformRule::EventCatalogJoin(rule) => {
                let events = scope_rows(
                    &sources[0],
                    &staging_name(&rule.events),
                    rule.filter.as_ref(),
                    Some(&rule.time_column),
                    run_date,
                )?;
                join::apply(rule, &events, &sources[1])?
            }
            TransformRule::CurrentState(rule) | TransformRule::MostComplete(rule) => {
                let source = scope_rows(
                    &sources[0],
                    &staging_name(&rule.source),
                    rule.filter.as_ref(),
                    rule.time_column.as_deref(),
                    run_date,
                )?;
                ranked::apply(rule, &source)?
            }
            TransformRule::SurrogateIdentity(rule) => {
                let source = scope_rows(
                    &sources[0],
                    &staging_name(&rule.source),
                    rule.filter.as_ref(),
                    rule.time_column.as_deref(),
                    run_date,
                )?;
                surrogate::apply(rule, &source)?
            }
            TransformRule::TimeParts(rule) => {
                let source = scope_rows(
                    &sources[0],
                    &staging_name(&rule.source),
                    rule.filter.as_ref(),
                    Some(&rule.time_column),
                    run_date,
                )?;
                time_parts::apply(rule, &source)?
            }
        };

        let stamp = Series::new(
            self.run_date_column.as_str().into(),
            vec![ctx.ds(); rows.height()],
        );
        rows.with_column(stamp)?;
        Ok(rows)
    }
}
