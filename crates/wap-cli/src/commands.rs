use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use wap_cli::summary::{
    check_table, history_table, print_backfill, print_failure, print_run_report, tables_table,
};
use wap_core::{JsonRunLedger, MemoryRunLedger, PipelineOrchestrator, RunLedger};
use wap_ingest::FileStagingLoader;
use wap_model::{PipelineConfig, RunContext};
use wap_warehouse::LocalWarehouse;

use crate::cli::{BackfillArgs, Cli, InspectArgs, RunArgs};

type Orchestrator = PipelineOrchestrator<LocalWarehouse, FileStagingLoader, Box<dyn RunLedger>>;

pub fn load_config(path: &Path, warehouse: Option<&PathBuf>) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(path)
        .with_context(|| format!("load pipeline config {}", path.display()))?;
    if let Some(root) = warehouse {
        config.warehouse.root = Some(root.clone());
    }
    Ok(config)
}

fn open_orchestrator(cli: &Cli) -> Result<Orchestrator> {
    let config = load_config(&cli.config, cli.warehouse.as_ref())?;
    let loader = FileStagingLoader::new(cli.data_root.clone());
    let (warehouse, ledger): (LocalWarehouse, Box<dyn RunLedger>) =
        match (&config.warehouse.root, config.warehouse.ledger_path()) {
            (Some(root), Some(ledger_path)) => {
                let warehouse = LocalWarehouse::open(root)
                    .with_context(|| format!("open warehouse {}", root.display()))?;
                let ledger = JsonRunLedger::open(&ledger_path)
                    .with_context(|| format!("open run ledger {}", ledger_path.display()))?;
                (warehouse, Box::new(ledger) as Box<dyn RunLedger>)
            }
            _ => {
                warn!("no warehouse root configured; relations and run history are not persisted");
                (
                    LocalWarehouse::in_memory(),
                    Box::new(MemoryRunLedger::new()) as Box<dyn RunLedger>,
                )
            }
        };
    info!(
        data_root = %cli.data_root.display(),
        tables = config.tables.len(),
        "pipeline opened"
    );
    Ok(PipelineOrchestrator::new(config, warehouse, loader, ledger))
}

/// Execute one run and print its report. Returns the process exit code.
pub fn run_date(cli: &Cli, args: &RunArgs) -> Result<i32> {
    let mut orchestrator = open_orchestrator(cli)?;
    match orchestrator.trigger(args.date) {
        Ok(report) => {
            print_run_report(&report);
            Ok(0)
        }
        Err(error) => {
            print_failure(&error);
            Ok(1)
        }
    }
}

pub fn run_backfill(cli: &Cli, args: &BackfillArgs) -> Result<i32> {
    if args.start > args.end {
        bail!("backfill start {} is after end {}", args.start, args.end);
    }
    let mut orchestrator = open_orchestrator(cli)?;

    let progress = ProgressBar::new(range_len(args.start, args.end));
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .context("progress bar template")?
            .progress_chars("=> "),
    );
    let mut started = 0u64;
    let report = orchestrator.backfill(args.start, args.end, |ctx| {
        if started > 0 {
            progress.inc(1);
        }
        started += 1;
        progress.set_message(ctx.run_id().to_string());
    });
    if report.succeeded() {
        progress.inc(1);
        progress.finish_with_message(format!("{} run(s) succeeded", report.runs.len()));
    } else {
        progress.abandon_with_message(format!(
            "stopped after {} successful run(s)",
            report.runs.len()
        ));
    }

    print_backfill(&report);
    Ok(if report.succeeded() { 0 } else { 1 })
}

pub fn run_inspect(cli: &Cli, args: &InspectArgs) -> Result<i32> {
    let orchestrator = open_orchestrator(cli)?;
    let records = match args.date {
        Some(date) => {
            let run_id = RunContext::run_id_for(date);
            match orchestrator.inspect(&run_id)? {
                Some(record) => vec![record],
                None => {
                    println!("No run recorded for {run_id}.");
                    return Ok(1);
                }
            }
        }
        None => orchestrator.history()?,
    };
    if records.is_empty() {
        println!("No runs recorded.");
        return Ok(0);
    }
    println!("{}", history_table(&records));
    for record in &records {
        if let Some(failure) = &record.failure
            && !failure.failed_checks.is_empty()
        {
            println!();
            println!("Failed checks for {}:", record.run_id);
            println!("{}", check_table(&failure.failed_checks));
        }
    }
    Ok(0)
}

pub fn run_tables(cli: &Cli) -> Result<i32> {
    let config = load_config(&cli.config, cli.warehouse.as_ref())?;
    println!("{}", tables_table(&config));
    Ok(0)
}

pub fn run_check_config(cli: &Cli) -> Result<i32> {
    let config = load_config(&cli.config, cli.warehouse.as_ref())?;
    println!(
        "{} is valid: {} staging relation(s), {} table(s), start date {}",
        cli.config.display(),
        config.staging.len(),
        config.tables.len(),
        config.schedule.start_date
    );
    Ok(0)
}

/// Inclusive number of dates in a backfill range.
fn range_len(start: NaiveDate, end: NaiveDate) -> u64 {
    u64::try_from((end - start).num_days() + 1).unwrap_or(0)
}
