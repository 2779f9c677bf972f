//! Pipeline configuration.
//!
//! The TOML file is deserialized into raw structs and converted once into
//! validated [`PipelineConfig`] values. Every invalid combination is
//! rejected here, before any run starts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rules::TransformRule;
use crate::table::{
    LoadStrategy, QualityCheckSpec, TableDescriptor, TableRole, TransformScope,
};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;
pub const DEFAULT_RUN_DATE_COLUMN: &str = "dwh_ds";
pub const MAX_RETRY_LIMIT: u32 = 100;
pub const LEDGER_FILE_NAME: &str = "runs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// First logical date; it has no predecessor run.
    pub start_date: NaiveDate,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_true")]
    pub depends_on_past: bool,
}

impl ScheduleConfig {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            depends_on_past: true,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Directory for persisted relations and the run ledger.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_run_date_column")]
    pub run_date_column: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            root: None,
            run_date_column: DEFAULT_RUN_DATE_COLUMN.to_string(),
        }
    }
}

impl WarehouseConfig {
    pub fn ledger_path(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(LEDGER_FILE_NAME))
    }
}

/// How a staging relation is cleared before a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionMode {
    /// Delete only rows whose time column falls on the run date.
    ByRunDate,
    /// Truncate the whole relation (full-catalog sources).
    FullTruncate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingDescriptor {
    pub table: String,
    /// Source path template, expanded per run.
    pub source_locator: String,
    pub deletion_mode: DeletionMode,
    /// Epoch-millisecond column used by [`DeletionMode::ByRunDate`].
    #[serde(default)]
    pub time_column: Option<String>,
}

/// Validated pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub schedule: ScheduleConfig,
    pub warehouse: WarehouseConfig,
    pub staging: Vec<StagingDescriptor>,
    pub tables: Vec<TableDescriptor>,
}

impl PipelineConfig {
    /// Read and validate a config file.
    ///
    /// A relative `warehouse.root` is resolved against the directory that
    /// holds the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(root) = config.warehouse.root.take() {
            config.warehouse.root = Some(match path.parent() {
                Some(dir) if root.is_relative() => dir.join(root),
                _ => root,
            });
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;
        raw.validate()
    }

    /// Validate already-typed parts, as when building a pipeline in code.
    pub fn new(
        schedule: ScheduleConfig,
        warehouse: WarehouseConfig,
        staging: Vec<StagingDescriptor>,
        tables: Vec<TableDescriptor>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            schedule,
            warehouse,
            staging,
            tables,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn staging(&self, table: &str) -> Option<&StagingDescriptor> {
        self.staging.iter().find(|staging| staging.table == table)
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Tables in WAP unit order: facts first, then dimensions, each in
    /// declaration order.
    pub fn wap_units(&self) -> Vec<&TableDescriptor> {
        let mut units: Vec<&TableDescriptor> = self.tables.iter().collect();
        units.sort_by_key(|table| table.role);
        units
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.max_retries > MAX_RETRY_LIMIT {
            return Err(ConfigError::RetryBoundTooLarge(self.schedule.max_retries));
        }

        let mut seen = BTreeSet::new();
        for staging in &self.staging {
            if !seen.insert(staging.table.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "staging",
                    name: staging.table.clone(),
                });
            }
            if staging.deletion_mode == DeletionMode::ByRunDate && staging.time_column.is_none() {
                return Err(ConfigError::StagingMissingTimeColumn {
                    table: staging.table.clone(),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "table",
                    name: table.name.clone(),
                });
            }
            self.validate_table(table)?;
        }

        if !self.tables.iter().any(|table| table.role == TableRole::Fact) {
            return Err(ConfigError::NoFactTable);
        }
        Ok(())
    }

    fn validate_table(&self, table: &TableDescriptor) -> Result<(), ConfigError> {
        let run_date_column = &self.warehouse.run_date_column;

        for source in table.transform.sources() {
            if self.staging(source).is_none() {
                return Err(ConfigError::UnknownSource {
                    table: table.name.clone(),
                    source_table: source.to_string(),
                });
            }
        }

        match &table.load_strategy {
            LoadStrategy::Merge {
                primary_key_columns,
            } if primary_key_columns.is_empty() => {
                return Err(ConfigError::MergeWithoutPrimaryKey {
                    table: table.name.clone(),
                });
            }
            LoadStrategy::PartitionOverwrite { partition_column }
                if partition_column != run_date_column =>
            {
                return Err(ConfigError::PartitionColumnMismatch {
                    table: table.name.clone(),
                    column: partition_column.clone(),
                    expected: run_date_column.clone(),
                });
            }
            _ => {}
        }

        if table.scope == TransformScope::RunDate && table.transform.time_column().is_none() {
            return Err(ConfigError::MissingTimeColumn {
                table: table.name.clone(),
            });
        }

        let outputs = table.transform.output_columns(run_date_column);
        let known = |column: &str| outputs.iter().any(|out| out == column);
        let unknown = |column: &str, context: &'static str| ConfigError::UnknownColumn {
            table: table.name.clone(),
            column: column.to_string(),
            context,
        };

        for column in &table.primary_key_columns {
            if !known(column) {
                return Err(unknown(column, "primary key"));
            }
        }
        for check in &table.quality_checks.checks {
            if !known(&check.column) {
                return Err(unknown(&check.column, "quality check"));
            }
        }
        if let TransformRule::EventCatalogJoin(rule) = &table.transform {
            for field in &rule.key_fields {
                if !known(field) {
                    return Err(unknown(field, "key field"));
                }
            }
        }
        let distinct: BTreeSet<&str> = outputs.iter().map(String::as_str).collect();
        if distinct.len() != outputs.len() {
            return Err(ConfigError::InvalidTable {
                table: table.name.clone(),
                message: "transform produces duplicate output column names".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    schedule: ScheduleConfig,
    #[serde(default)]
    warehouse: WarehouseConfig,
    #[serde(default)]
    staging: Vec<StagingDescriptor>,
    #[serde(default)]
    tables: Vec<RawTable>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawLoadStrategy {
    Append,
    PartitionOverwrite,
    FullRefresh,
    Merge,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQualityChecks {
    #[serde(default)]
    not_null: Vec<String>,
    #[serde(default)]
    unique: Vec<String>,
    #[serde(default, alias = "greater_than_zero")]
    positive: Vec<String>,
}

impl RawQualityChecks {
    fn into_spec(self) -> QualityCheckSpec {
        let spec = self
            .not_null
            .into_iter()
            .fold(QualityCheckSpec::new(), QualityCheckSpec::not_null);
        let spec = self.unique.into_iter().fold(spec, QualityCheckSpec::unique);
        self.positive
            .into_iter()
            .fold(spec, QualityCheckSpec::positive)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    name: String,
    role: TableRole,
    load_strategy: RawLoadStrategy,
    /// Defaults to the run-date column.
    #[serde(default)]
    partition_column: Option<String>,
    #[serde(default)]
    primary_key_columns: Vec<String>,
    #[serde(default)]
    scope: TransformScope,
    #[serde(default)]
    quality_checks: RawQualityChecks,
    transform: TransformRule,
}

impl RawTable {
    fn into_descriptor(self, run_date_column: &str) -> TableDescriptor {
        let load_strategy = match self.load_strategy {
            RawLoadStrategy::Append => LoadStrategy::Append,
            RawLoadStrategy::PartitionOverwrite => LoadStrategy::PartitionOverwrite {
                partition_column: self
                    .partition_column
                    .unwrap_or_else(|| run_date_column.to_string()),
            },
            RawLoadStrategy::FullRefresh => LoadStrategy::FullRefresh,
            RawLoadStrategy::Merge => LoadStrategy::Merge {
                primary_key_columns: self.primary_key_columns.clone(),
            },
        };
        TableDescriptor {
            name: self.name,
            role: self.role,
            load_strategy,
            primary_key_columns: self.primary_key_columns,
            scope: self.scope,
            quality_checks: self.quality_checks.into_spec(),
            transform: self.transform,
        }
    }
}

impl RawConfig {
    fn validate(self) -> Result<PipelineConfig, ConfigError> {
        let run_date_column = self.warehouse.run_date_column.clone();
        let tables = self
            .tables
            .into_iter()
            .map(|table| table.into_descriptor(&run_date_column))
            .collect();
        PipelineConfig::new(self.schedule, self.warehouse, self.staging, tables)
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_run_date_column() -> String {
    DEFAULT_RUN_DATE_COLUMN.to_string()
}

fn default_true() -> bool {
    true
}
