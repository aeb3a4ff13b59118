use std::io::Write;
use std::path::Path;

use crate::error::LitError;

pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, LitError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| LitError::SheetRead(format!("open {}: {err}", path.display())))?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| LitError::SheetRead(err.to_string()))?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    // Excel-exported CSV files start with a byte order mark
    if let Some(first) = rows.first_mut().and_then(|row| row.first_mut()) {
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    Ok(rows)
}

pub fn write_rows<W: Write>(
    writer: W,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<(), LitError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer
        .write_record(headers)
        .map_err(|err| LitError::SheetWrite(err.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| LitError::SheetWrite(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| LitError::SheetWrite(err.to_string()))
}
