//! Spreadsheet input and output, dispatched on the file extension.

use std::path::Path;

use crate::domain::{AnalysisRecord, Entity};
use crate::error::LitError;

pub mod delimited;
pub mod xlsx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Result<Self, LitError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" => Ok(SheetFormat::Xlsx),
            "csv" => Ok(SheetFormat::Csv),
            _ => Err(LitError::UnsupportedSheetFormat(path.display().to_string())),
        }
    }
}

pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, LitError> {
    match SheetFormat::from_path(path)? {
        SheetFormat::Xlsx => xlsx::read_rows(path),
        SheetFormat::Csv => delimited::read_rows(path),
    }
}

/// Reads the named column below the header row. Blank cells are skipped.
pub fn read_entities(path: &Path, column: &str) -> Result<Vec<Entity>, LitError> {
    let rows = read_rows(path)?;
    let mut rows = rows.into_iter();
    let header = rows.next().unwrap_or_default();
    let index = header
        .iter()
        .position(|name| name.trim() == column.trim())
        .ok_or_else(|| LitError::MissingColumn {
            column: column.to_string(),
            path: path.display().to_string(),
        })?;

    let entities = rows
        .filter_map(|row| row.get(index).cloned())
        .filter_map(|cell| cell.parse::<Entity>().ok())
        .collect();
    Ok(entities)
}

pub fn write_records(
    path: &Path,
    records: &[AnalysisRecord],
    with_provenance: bool,
) -> Result<(), LitError> {
    let format = SheetFormat::from_path(path)?;
    let headers = AnalysisRecord::headers(with_provenance);
    let rows = records
        .iter()
        .map(|record| record.cells(with_provenance))
        .collect::<Vec<_>>();

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|err| LitError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".placenta-lit")
        .tempfile_in(&parent)
        .map_err(|err| LitError::Filesystem(err.to_string()))?;

    let temp = match format {
        SheetFormat::Xlsx => xlsx::write_rows(temp, &headers, &rows)?,
        SheetFormat::Csv => {
            delimited::write_rows(&mut temp, &headers, &rows)?;
            temp
        }
    };
    temp.persist(path)
        .map_err(|err| LitError::Filesystem(err.to_string()))?;
    tracing::info!(path = %path.display(), rows = records.len(), "results written");
    Ok(())
}
