//! Orchestration of Write-Audit-Publish runs.
//!
//! A run loads every staging relation, then executes one WAP unit per
//! destination table (fact first, then dimensions): write the audit
//! relation, audit it, publish it. Runs are keyed by date in a
//! [`RunLedger`]; a run only starts once its predecessor has succeeded.

pub mod ledger;
pub mod orchestrator;
pub mod report;
pub mod retry;

pub use ledger::{JsonRunLedger, LedgerError, MemoryRunLedger, RunLedger};
pub use orchestrator::PipelineOrchestrator;
pub use report::{BackfillReport, RunReport, UnitReport};
pub use retry::RetryPolicy;
