use std::path::PathBuf;

use thiserror::Error;
use wap_warehouse::WarehouseError;

/// Errors that can occur while loading a staging relation.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A full-catalog source resolved to nothing.
    #[error("source not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    #[error("staging {table}: {message}")]
    InvalidStaging { table: String, message: String },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
