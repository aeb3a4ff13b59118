use std::io::{Cursor, Write};

use assert_matches::assert_matches;

use placenta_lit::domain::{AnalysisRecord, EvidenceType, FrequencyTag};
use placenta_lit::error::LitError;
use placenta_lit::sheet::{self, xlsx};

fn record(entity: &str) -> AnalysisRecord {
    AnalysisRecord {
        entity: entity.to_string(),
        pubmed_doi: "10.1016/j.placenta.2021.01.001".to_string(),
        pubmed_link: "https://pubmed.ncbi.nlm.nih.gov/1/".to_string(),
        europe_pmc_doi: "Not found".to_string(),
        scholar_link: format!("https://scholar.google.com/scholar?q={entity}"),
        pathway: "Not available".to_string(),
        evidence_type: EvidenceType::Indirect,
        source_document: Some("paper <1> & notes.pdf".to_string()),
        mention_count: Some(4),
        frequency_tag: Some(FrequencyTag::Medium),
    }
}

#[test]
fn xlsx_written_rows_read_back() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("results.xlsx");
    sheet::write_records(&path, &[record("VEGFA"), record("HLA-G")], true).unwrap();

    let rows = sheet::read_rows(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], AnalysisRecord::headers(true));
    assert_eq!(rows[1][0], "VEGFA");
    assert_eq!(rows[2][0], "HLA-G");
    assert_eq!(rows[1][7], "paper <1> & notes.pdf");
    assert_eq!(rows[1][8], "4");
    assert_eq!(rows[1][9], "Medium");
}

#[test]
fn xlsx_input_column_lookup() {
    let headers = ["Metabolite", "Gene"];
    let rows = vec![
        vec!["glucose".to_string(), "PGF".to_string()],
        vec!["lactate".to_string(), "".to_string()],
        vec!["".to_string(), " LEP ".to_string()],
    ];
    let bytes = xlsx::write_rows(Cursor::new(Vec::new()), &headers, &rows)
        .unwrap()
        .into_inner();

    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("input.xlsx");
    std::fs::write(&path, bytes).unwrap();

    let genes = sheet::read_entities(&path, "Gene").unwrap();
    let genes = genes.iter().map(|e| e.as_str()).collect::<Vec<_>>();
    assert_eq!(genes, vec!["PGF", "LEP"]);

    let metabolites = sheet::read_entities(&path, "Metabolite").unwrap();
    assert_eq!(metabolites.len(), 2);
}

#[test]
fn csv_output_without_provenance() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("results.csv");
    sheet::write_records(&path, &[record("TNF")], false).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some("Entity,PubMed_DOI,PubMed_Link,EuropePMC_DOI,Scholar_Link,Pathway,Evidence_Type")
    );
    assert!(lines.next().unwrap().ends_with(",Not available,Indirect"));
}

#[test]
fn garbage_xlsx_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("input.xlsx");
    std::fs::write(&path, b"Gene\nVEGFA\n").unwrap();
    assert_matches!(sheet::read_rows(&path), Err(LitError::SheetRead(_)));
}

/// A workbook holding nothing but `xl/worksheets/sheet1.xml`.
fn bare_workbook(dir: &std::path::Path, sheet_data: &str) -> std::path::PathBuf {
    let path = dir.join("input.xlsx");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    zip.start_file(
        "xl/worksheets/sheet1.xml",
        zip::write::SimpleFileOptions::default(),
    )
    .unwrap();
    write!(zip, "<worksheet><sheetData>{sheet_data}</sheetData></worksheet>").unwrap();
    zip.finish().unwrap();
    path
}

#[test]
fn oversized_column_reference_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = bare_workbook(
        temp.path(),
        r#"<row r="1"><c r="ZZZZZZZZZZZZZZZ1" t="inlineStr"><is><t>Gene</t></is></c></row>"#,
    );
    assert_matches!(sheet::read_entities(&path, "Gene"), Err(LitError::SheetRead(_)));

    let path = bare_workbook(
        temp.path(),
        r#"<row r="1"><c r="AAAAAAA1" t="inlineStr"><is><t>Gene</t></is></c></row>"#,
    );
    assert_matches!(sheet::read_entities(&path, "Gene"), Err(LitError::SheetRead(_)));
}

#[test]
fn oversized_row_reference_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = bare_workbook(
        temp.path(),
        r#"<row r="4000000000"><c r="A4000000000" t="inlineStr"><is><t>Gene</t></is></c></row>"#,
    );
    assert_matches!(sheet::read_entities(&path, "Gene"), Err(LitError::SheetRead(_)));
}

#[test]
fn last_excel_column_is_still_readable() {
    let temp = tempfile::tempdir().unwrap();
    let path = bare_workbook(
        temp.path(),
        r#"<row r="1"><c r="XFD1" t="inlineStr"><is><t>Gene</t></is></c></row>
           <row r="2"><c r="XFD2" t="inlineStr"><is><t>PGF</t></is></c></row>"#,
    );
    let genes = sheet::read_entities(&path, "Gene").unwrap();
    assert_eq!(genes.len(), 1);
    assert_eq!(genes[0].as_str(), "PGF");
}
