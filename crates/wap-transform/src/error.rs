use polars::prelude::PolarsError;
use thiserror::Error;
use wap_warehouse::WarehouseError;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{relation}: column {column} not found")]
    MissingColumn { relation: String, column: String },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
