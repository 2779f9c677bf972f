//! Polars-backed warehouse with optional CSV persistence.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::{
    BooleanChunked, Column, CsvReadOptions, CsvWriter, DataFrame, IntoColumn, NewChunkedArray,
    SerReader, SerWriter, Series,
};
use tracing::{debug, info};
use wap_model::{Layer, RelationRef};

use crate::Warehouse;
use crate::error::{Result, WarehouseError};
use crate::predicate::Predicate;

/// Relations held in memory, keyed by layer and table.
///
/// When opened on a root directory every mutated relation is rewritten to
/// `<root>/<layer>/<table>.csv` before the in-memory copy changes, so a
/// failed write leaves both copies at the previous state.
#[derive(Debug, Default)]
pub struct LocalWarehouse {
    root: Option<PathBuf>,
    relations: BTreeMap<RelationRef, DataFrame>,
}

impl LocalWarehouse {
    /// A warehouse that lives only for the current process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a persisted warehouse, loading every relation found under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut relations = BTreeMap::new();
        for layer in Layer::ALL {
            let dir = root.join(layer.as_str());
            if !dir.is_dir() {
                continue;
            }
            for path in list_relation_files(&dir)? {
                let Some(table) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                let frame = read_relation_file(&path)?;
                debug!(layer = %layer, table, rows = frame.height(), "loaded relation");
                relations.insert(RelationRef::new(layer, table), frame);
            }
        }
        info!(root = %root.display(), relations = relations.len(), "opened warehouse");
        Ok(Self {
            root: Some(root),
            relations,
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Every relation currently held, in layer then table order.
    pub fn relations(&self) -> impl Iterator<Item = &RelationRef> {
        self.relations.keys()
    }

    fn relation_path(root: &Path, relation: &RelationRef) -> PathBuf {
        root.join(relation.layer.as_str())
            .join(format!("{}.csv", relation.table))
    }

    /// Persist then swap in the new state of a relation.
    fn commit(&mut self, relation: &RelationRef, frame: DataFrame) -> Result<()> {
        if let Some(root) = &self.root {
            write_relation_file(&Self::relation_path(root, relation), &frame)?;
        }
        self.relations.insert(relation.clone(), frame);
        Ok(())
    }
}

impl Warehouse for LocalWarehouse {
    fn read(&self, relation: &RelationRef) -> Result<DataFrame> {
        Ok(self
            .relations
            .get(relation)
            .cloned()
            .unwrap_or_else(DataFrame::empty))
    }

    fn insert(&mut self, relation: &RelationRef, rows: &DataFrame) -> Result<usize> {
        let inserted = rows.height();
        let merged = match self.relations.get(relation) {
            Some(existing) if existing.width() > 0 => {
                let aligned = align_to(existing, rows, relation)?;
                if existing.height() == 0 {
                    aligned
                } else {
                    let mut merged = existing.clone();
                    merged.vstack_mut(&aligned)?;
                    merged
                }
            }
            _ => rows.clone(),
        };
        self.commit(relation, merged)?;
        debug!(relation = %relation, rows = inserted, "insert");
        Ok(inserted)
    }

    fn truncate(&mut self, relation: &RelationRef) -> Result<usize> {
        let Some(existing) = self.relations.get(relation) else {
            return Ok(0);
        };
        let removed = existing.height();
        let cleared = existing.clear();
        self.commit(relation, cleared)?;
        debug!(relation = %relation, rows = removed, "truncate");
        Ok(removed)
    }

    fn delete_where(&mut self, relation: &RelationRef, predicate: &Predicate) -> Result<usize> {
        let Some(existing) = self.relations.get(relation) else {
            return Ok(0);
        };
        if existing.height() == 0 {
            return Ok(0);
        }
        let name = relation.to_string();
        let keep: Vec<bool> = predicate
            .mask(existing, &name)?
            .into_iter()
            .map(|matched| !matched)
            .collect();
        let removed = keep.iter().filter(|kept| !**kept).count();
        if removed == 0 {
            return Ok(0);
        }
        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let remaining = existing.filter(&mask)?;
        self.commit(relation, remaining)?;
        debug!(relation = %relation, predicate = %predicate, rows = removed, "delete");
        Ok(removed)
    }

    fn row_count(&self, relation: &RelationRef) -> Result<usize> {
        Ok(self.relations.get(relation).map_or(0, DataFrame::height))
    }

    fn exists(&self, relation: &RelationRef) -> bool {
        self.relations.contains_key(relation)
    }
}

/// Reorder and cast `rows` to the columns of `target`.
///
/// Columns missing from `rows` are filled with NULL; columns unknown to
/// `target` are rejected. An empty target adopts the incoming dtypes.
fn align_to(target: &DataFrame, rows: &DataFrame, relation: &RelationRef) -> Result<DataFrame> {
    for name in rows.get_column_names() {
        if target.column(name.as_str()).is_err() {
            return Err(WarehouseError::SchemaMismatch {
                relation: relation.to_string(),
                message: format!("column {name} does not exist in the relation"),
            });
        }
    }

    let height = rows.height();
    let adopt_incoming = target.height() == 0;
    let mut columns: Vec<Column> = Vec::with_capacity(target.width());
    for target_column in target.get_columns() {
        let name = target_column.name();
        let dtype = target_column.dtype();
        let series = match rows.column(name.as_str()) {
            Ok(column) => {
                let series = column.as_materialized_series();
                if adopt_incoming || series.dtype() == dtype {
                    series.clone()
                } else {
                    series
                        .strict_cast(dtype)
                        .map_err(|err| WarehouseError::SchemaMismatch {
                            relation: relation.to_string(),
                            message: format!("column {name} cannot be stored as {dtype}: {err}"),
                        })?
                }
            }
            Err(_) => Series::full_null(name.clone(), height, dtype),
        };
        columns.push(series.into_column());
    }
    Ok(DataFrame::new(columns)?)
}

fn list_relation_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| WarehouseError::io("read directory", dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| WarehouseError::io("read directory", dir, e))?
            .path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_relation_file(path: &Path) -> Result<DataFrame> {
    let size = fs::metadata(path)
        .map_err(|e| WarehouseError::io("stat", path, e))?
        .len();
    if size == 0 {
        return Ok(DataFrame::empty());
    }
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(frame)
}

/// Write-then-rename so readers never observe a half-written file.
fn write_relation_file(path: &Path, frame: &DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| WarehouseError::io("create directory", parent, e))?;
    }
    let temp_path = path.with_extension("csv.tmp");
    let mut file = File::create(&temp_path).map_err(|e| WarehouseError::io("create", &temp_path, e))?;
    if frame.width() > 0 {
        let mut frame = frame.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
    }
    file.sync_all()
        .map_err(|e| WarehouseError::io("sync", &temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| WarehouseError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
