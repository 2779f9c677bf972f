//! Load-strategy dispatch.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info};
use wap_model::{LoadStrategy, RelationRef, RunContext, TableDescriptor};
use wap_warehouse::{Predicate, Result, Warehouse};

/// What one promotion did to production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionSummary {
    pub table: String,
    pub strategy: &'static str,
    pub rows_deleted: usize,
    pub rows_inserted: usize,
}

impl fmt::Display for PromotionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prod.{} {}: -{} +{}",
            self.table, self.strategy, self.rows_deleted, self.rows_inserted
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Publisher;

impl Publisher {
    pub fn new() -> Self {
        Self
    }

    /// Apply the audit relation to production, then clear the audit
    /// relation.
    ///
    /// Each strategy deletes with a predicate derived from the run or the
    /// audit rows, so repeating a promotion after a partial failure
    /// converges on the same production content.
    pub fn promote(
        &self,
        ctx: &RunContext,
        table: &TableDescriptor,
        warehouse: &mut dyn Warehouse,
    ) -> Result<PromotionSummary> {
        let started = Instant::now();
        let audit = RelationRef::audit(&table.name);
        let production = RelationRef::production(&table.name);
        let rows = warehouse.read(&audit)?;

        let rows_deleted = match &table.load_strategy {
            LoadStrategy::Append => 0,
            LoadStrategy::PartitionOverwrite { partition_column } => warehouse.delete_where(
                &production,
                &Predicate::equals(partition_column, ctx.ds()),
            )?,
            LoadStrategy::FullRefresh => warehouse.truncate(&production)?,
            LoadStrategy::Merge {
                primary_key_columns,
            } => {
                let keys = Predicate::keys_of(&rows, primary_key_columns, &audit.to_string())?;
                warehouse.delete_where(&production, &keys)?
            }
        };
        debug!(rows = rows_deleted, "production rows removed");

        let rows_inserted = warehouse.insert(&production, &rows)?;
        warehouse.truncate(&audit)?;

        let summary = PromotionSummary {
            table: table.name.clone(),
            strategy: table.load_strategy.name(),
            rows_deleted,
            rows_inserted,
        };
        info!(
            strategy = summary.strategy,
            deleted = rows_deleted,
            inserted = rows_inserted,
            duration_ms = started.elapsed().as_millis() as u64,
            "promoted"
        );
        Ok(summary)
    }
}
