//! Minimal Office Open XML workbook support: enough to read a column of names
//! from the first worksheet and to write a single-sheet result table.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

use crate::error::LitError;

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const FIRST_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Column `XFD`, the widest sheet Excel can open.
pub const MAX_COLUMNS: usize = 16_384;
pub const MAX_ROWS: usize = 1_048_576;

pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, LitError> {
    let file = File::open(path)
        .map_err(|err| LitError::SheetRead(format!("open {}: {err}", path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| LitError::SheetRead(format!("not an xlsx: {err}")))?;

    let shared = match read_entry(&mut archive, SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_name = first_sheet_name(&archive)
        .ok_or_else(|| LitError::SheetRead("workbook has no worksheets".to_string()))?;
    let sheet_xml = read_entry(&mut archive, &sheet_name)?
        .ok_or_else(|| LitError::SheetRead(format!("missing {sheet_name}")))?;
    parse_sheet(&sheet_xml, &shared)
}

pub fn write_rows<W: Write + Seek>(
    writer: W,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<W, LitError> {
    let mut zip = zip::ZipWriter::new(writer);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        (FIRST_SHEET, render_sheet(headers, rows)),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)
            .map_err(|err| LitError::SheetWrite(err.to_string()))?;
        zip.write_all(content.as_bytes())
            .map_err(|err| LitError::SheetWrite(err.to_string()))?;
    }
    zip.finish()
        .map_err(|err| LitError::SheetWrite(err.to_string()))
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, LitError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(LitError::SheetRead(err.to_string())),
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|err| LitError::SheetRead(format!("{name}: {err}")))?;
    Ok(Some(content))
}

/// `sheet1.xml` when present, otherwise the lexically first worksheet part.
fn first_sheet_name<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    let mut sheets = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/") && name.ends_with(".xml"))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    if sheets.iter().any(|name| name == FIRST_SHEET) {
        return Some(FIRST_SHEET.to_string());
    }
    sheets.sort();
    sheets.into_iter().next()
}

fn xml_err(err: impl std::fmt::Display) -> LitError {
    LitError::SheetRead(format!("invalid XML: {err}"))
}

fn attr(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, LitError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(xml_err)?;
        if attribute.key.local_name().as_ref() == name {
            let value = attribute.unescape_value().map_err(xml_err)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, LitError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // phonetic runs repeat the text in another script
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(text) if in_text => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(current.take().unwrap_or_default()),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

struct PendingCell {
    column: usize,
    kind: Option<String>,
    value: String,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, LitError> {
    let mut reader = Reader::from_str(xml);
    let mut cells = BTreeMap::<usize, BTreeMap<usize, String>>::new();
    let mut row = 0usize;
    let mut next_row = 0usize;
    let mut pending: Option<PendingCell> = None;
    let mut capture = false;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_index(&e, next_row)?;
                    next_row = row + 1;
                }
                b"c" => {
                    let fallback = cells
                        .get(&row)
                        .and_then(|existing| existing.keys().next_back())
                        .map(|last| last + 1)
                        .unwrap_or(0);
                    let column = match attr(&e, b"r")? {
                        Some(reference) => cell_column(&reference)?.unwrap_or(fallback),
                        None => fallback,
                    };
                    if column >= MAX_COLUMNS {
                        return Err(LitError::SheetRead(format!(
                            "row {} has more than {MAX_COLUMNS} columns",
                            row + 1
                        )));
                    }
                    pending = Some(PendingCell {
                        column,
                        kind: attr(&e, b"t")?,
                        value: String::new(),
                    });
                }
                b"v" | b"t" => capture = pending.is_some(),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                next_row = row_index(&e, next_row)? + 1;
            }
            Event::Text(text) if capture => {
                if let Some(cell) = pending.as_mut() {
                    cell.value.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let value = resolve_cell(cell.kind.as_deref(), cell.value, shared);
                        cells.entry(row).or_default().insert(cell.column, value);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let Some(last_row) = cells.keys().next_back().copied() else {
        return Ok(Vec::new());
    };
    let first_row = cells.keys().next().copied().unwrap_or(0);
    let rows = (first_row..=last_row)
        .map(|index| match cells.remove(&index) {
            Some(row_cells) => {
                let width = row_cells.keys().next_back().map(|c| c + 1).unwrap_or(0);
                let mut dense = vec![String::new(); width];
                for (column, value) in row_cells {
                    dense[column] = value;
                }
                dense
            }
            None => Vec::new(),
        })
        .collect();
    Ok(rows)
}

fn row_index(element: &BytesStart<'_>, fallback: usize) -> Result<usize, LitError> {
    let index = match attr(element, b"r")? {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|one_based| (1..=MAX_ROWS).contains(one_based))
            .map(|one_based| one_based - 1)
            .ok_or_else(|| LitError::SheetRead(format!("row reference {value} is out of range")))?,
        None => fallback,
    };
    if index >= MAX_ROWS {
        return Err(LitError::SheetRead(format!("more than {MAX_ROWS} rows")));
    }
    Ok(index)
}

/// `Ok(None)` when the reference carries no column letters.
fn cell_column(reference: &str) -> Result<Option<usize>, LitError> {
    if !reference.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return Ok(None);
    }
    column_index(reference)
        .map(Some)
        .ok_or_else(|| LitError::SheetRead(format!("cell reference {reference} is out of range")))
}

fn resolve_cell(kind: Option<&str>, raw: String, shared: &[String]) -> String {
    match kind {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| shared.get(index).cloned())
            .unwrap_or_default(),
        Some("b") => {
            if raw.trim() == "1" {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        _ => raw,
    }
}

/// `"B7"` -> 1, `"AA3"` -> 26. `None` without letters or past `XFD`.
pub fn column_index(reference: &str) -> Option<usize> {
    let mut number = 0usize;
    let mut letters = 0;
    for ch in reference.chars().take_while(|ch| ch.is_ascii_alphabetic()) {
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        number = number.checked_mul(26)?.checked_add(digit)?;
        letters += 1;
    }
    if letters == 0 || number > MAX_COLUMNS {
        return None;
    }
    Some(number - 1)
}

pub fn column_name(index: usize) -> String {
    let mut name = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    name.iter().rev().collect()
}

fn render_sheet(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    let header_row = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    for (index, cells) in std::iter::once(&header_row).chain(rows.iter()).enumerate() {
        let row_number = index + 1;
        xml.push_str(&format!(r#"<row r="{row_number}">"#));
        for (column, value) in cells.iter().enumerate() {
            xml.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(column),
                row_number,
                escape(value.as_str())
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Results" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;
