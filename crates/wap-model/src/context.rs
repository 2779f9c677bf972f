//! Immutable identity of one logical execution.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::time::date_of_epoch_millis;

/// One logical run, identified by its execution date.
///
/// Created once by the orchestrator and passed by reference to every
/// stage. It decides which staging slice is visible to a run and which
/// production partition the run may overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunContext {
    run_date: NaiveDate,
    run_id: String,
}

impl RunContext {
    pub fn new(run_date: NaiveDate) -> Self {
        Self {
            run_date,
            run_id: Self::run_id_for(run_date),
        }
    }

    /// Run identifier used as the ledger key for a date.
    pub fn run_id_for(run_date: NaiveDate) -> String {
        format!("scheduled__{}", run_date.format("%Y-%m-%d"))
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The run date as `YYYY-MM-DD`.
    pub fn ds(&self) -> String {
        self.run_date.format("%Y-%m-%d").to_string()
    }

    /// True when an epoch-millisecond timestamp falls on the run date (UTC).
    pub fn contains_epoch_millis(&self, millis: i64) -> bool {
        date_of_epoch_millis(millis) == Some(self.run_date)
    }

    /// Expand a source locator template for this run.
    ///
    /// Supported placeholders: `{ds}`, `{year}`, `{month}`, `{mm}`,
    /// `{day}`, `{dd}`. `{month}` and `{day}` are not zero padded.
    pub fn render_template(&self, template: &str) -> String {
        let date = self.run_date;
        template
            .replace("{ds}", &self.ds())
            .replace("{year}", &date.year().to_string())
            .replace("{month}", &date.month().to_string())
            .replace("{mm}", &format!("{:02}", date.month()))
            .replace("{day}", &date.day().to_string())
            .replace("{dd}", &format!("{:02}", date.day()))
    }
}
