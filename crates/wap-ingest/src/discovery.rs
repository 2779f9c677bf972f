//! Source file discovery.

use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

/// Lists every CSV file beneath a directory, recursing into
/// subdirectories.
///
/// Returns paths sorted so loads are reproducible.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_csv_files(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_csv_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_csv_files(&path, files)?;
            continue;
        }

        // Case-insensitive extension check
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(path);
        }
    }
    Ok(())
}

/// Resolve a rendered locator to the files it names.
///
/// A directory yields every CSV beneath it, a file yields itself, and a
/// path that does not exist yields nothing.
pub fn resolve_sources(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_dir() {
        list_csv_files(path)
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Ok(Vec::new())
    }
}
