//! Run status persistence keyed by run id.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use wap_model::RunRecord;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run ledger {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to replace {target_path} with {temp_path}: {source}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable store of [`RunRecord`]s.
pub trait RunLedger {
    fn get(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError>;

    /// Insert or replace the record with the same `run_id`.
    fn put(&mut self, record: &RunRecord) -> Result<(), LedgerError>;

    /// Every record, ordered by run date.
    fn records(&self) -> Result<Vec<RunRecord>, LedgerError>;

    /// The record currently holding the active-run slot, if any.
    fn active(&self) -> Result<Option<RunRecord>, LedgerError> {
        Ok(self
            .records()?
            .into_iter()
            .find(|record| record.status.is_active()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRunLedger {
    records: BTreeMap<String, RunRecord>,
}

impl MemoryRunLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunLedger for MemoryRunLedger {
    fn get(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError> {
        Ok(self.records.get(run_id).cloned())
    }

    fn put(&mut self, record: &RunRecord) -> Result<(), LedgerError> {
        self.records.insert(record.run_id.clone(), record.clone());
        Ok(())
    }

    fn records(&self) -> Result<Vec<RunRecord>, LedgerError> {
        Ok(self.records.values().cloned().collect())
    }
}

/// Ledger kept as a JSON array, rewritten on every change.
#[derive(Debug)]
pub struct JsonRunLedger {
    path: PathBuf,
    records: BTreeMap<String, RunRecord>,
}

impl JsonRunLedger {
    /// Open the ledger at `path`; a missing file is an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let records = if path.exists() {
            let contents =
                fs::read_to_string(&path).map_err(|e| LedgerError::io("read", &path, e))?;
            let list: Vec<RunRecord> =
                serde_json::from_str(&contents).map_err(|source| LedgerError::Json {
                    path: path.clone(),
                    source,
                })?;
            list.into_iter()
                .map(|record| (record.run_id.clone(), record))
                .collect()
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), runs = records.len(), "opened run ledger");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, records: &BTreeMap<String, RunRecord>) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LedgerError::io("create directory", parent, e))?;
        }
        let list: Vec<&RunRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list).map_err(|source| LedgerError::Json {
            path: self.path.clone(),
            source,
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file =
            File::create(&temp_path).map_err(|e| LedgerError::io("create", &temp_path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| LedgerError::io("write", &temp_path, e))?;
        file.sync_all()
            .map_err(|e| LedgerError::io("sync", &temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|source| LedgerError::AtomicWriteFailed {
            temp_path: temp_path.clone(),
            target_path: self.path.clone(),
            source,
        })
    }
}

impl RunLedger for JsonRunLedger {
    fn get(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError> {
        Ok(self.records.get(run_id).cloned())
    }

    fn put(&mut self, record: &RunRecord) -> Result<(), LedgerError> {
        let mut next = self.records.clone();
        next.insert(record.run_id.clone(), record.clone());
        self.save(&next)?;
        self.records = next;
        Ok(())
    }

    fn records(&self) -> Result<Vec<RunRecord>, LedgerError> {
        Ok(self.records.values().cloned().collect())
    }
}

impl<L: RunLedger + ?Sized> RunLedger for Box<L> {
    fn get(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError> {
        (**self).get(run_id)
    }

    fn put(&mut self, record: &RunRecord) -> Result<(), LedgerError> {
        (**self).put(record)
    }

    fn records(&self) -> Result<Vec<RunRecord>, LedgerError> {
        (**self).records()
    }

    fn active(&self) -> Result<Option<RunRecord>, LedgerError> {
        (**self).active()
    }
}
