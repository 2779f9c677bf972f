//! CLI argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "wap",
    version,
    about = "Write-Audit-Publish loader for a dimensional warehouse",
    long_about = "Load raw event and catalog files into staging, build fact and dimension\n\
                  rows into audit relations, gate them on quality checks and promote them\n\
                  to production, one logical run per date."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration file.
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        default_value = "config/pipeline.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Directory that staging source locators are resolved against.
    #[arg(long = "data-root", value_name = "DIR", default_value = "data", global = true)]
    pub data_root: PathBuf,

    /// Warehouse directory (overrides `warehouse.root` from the config).
    #[arg(long = "warehouse", value_name = "DIR", global = true)]
    pub warehouse: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute the logical run for one date.
    Run(RunArgs),

    /// Execute consecutive dates in ascending order, stopping at the first failure.
    Backfill(BackfillArgs),

    /// Show the recorded status of one run, or of every run.
    Inspect(InspectArgs),

    /// List the configured destination tables in WAP unit order.
    Tables,

    /// Validate the configuration and exit.
    CheckConfig,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Logical run date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: NaiveDate,
}

#[derive(Parser)]
pub struct BackfillArgs {
    /// First date to run.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: NaiveDate,

    /// Last date to run (inclusive).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: NaiveDate,
}

#[derive(Parser)]
pub struct InspectArgs {
    /// Run date to inspect; every run is listed when omitted.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
