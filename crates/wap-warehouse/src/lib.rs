//! Relational engine interface.
//!
//! The WAP stages only ever talk to relations through [`Warehouse`]: each
//! call is one synchronous statement that either applies fully or leaves
//! the relation as it was. [`LocalWarehouse`] keeps relations as polars
//! `DataFrame`s and can persist them as CSV files.

pub mod error;
pub mod local;
pub mod predicate;

pub use error::{Result, WarehouseError};
pub use local::LocalWarehouse;
pub use predicate::{KeyTuple, Predicate};

use polars::prelude::DataFrame;
use wap_model::RelationRef;

/// Synchronous statement execution against named relations.
pub trait Warehouse {
    /// Snapshot of a relation. A relation that was never written reads as
    /// an empty frame.
    fn read(&self, relation: &RelationRef) -> Result<DataFrame>;

    /// Append rows, aligning them to the relation's columns. Creates the
    /// relation on first insert. Returns the number of rows inserted.
    fn insert(&mut self, relation: &RelationRef, rows: &DataFrame) -> Result<usize>;

    /// Remove every row, keeping the columns. Returns the rows removed.
    fn truncate(&mut self, relation: &RelationRef) -> Result<usize>;

    /// Remove rows matching `predicate`. Returns the rows removed.
    fn delete_where(&mut self, relation: &RelationRef, predicate: &Predicate) -> Result<usize>;

    fn row_count(&self, relation: &RelationRef) -> Result<usize>;

    fn exists(&self, relation: &RelationRef) -> bool;
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn read(&self, relation: &RelationRef) -> Result<DataFrame> {
        (**self).read(relation)
    }

    fn insert(&mut self, relation: &RelationRef, rows: &DataFrame) -> Result<usize> {
        (**self).insert(relation, rows)
    }

    fn truncate(&mut self, relation: &RelationRef) -> Result<usize> {
        (**self).truncate(relation)
    }

    fn delete_where(&mut self, relation: &RelationRef, predicate: &Predicate) -> Result<usize> {
        (**self).delete_where(relation, predicate)
    }

    fn row_count(&self, relation: &RelationRef) -> Result<usize> {
        (**self).row_count(relation)
    }

    fn exists(&self, relation: &RelationRef) -> bool {
        (**self).exists(relation)
    }
}
