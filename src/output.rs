use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ClassifyResult, ProgressEvent, ProgressSink, RunSummary, ScanSummary};
use crate::domain::{EvidenceType, NOT_FOUND};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_scan(result: &ScanSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_classify(result: &[ClassifyResult]) -> io::Result<()> {
        Self::print_json(&result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_run(result: &RunSummary) {
        let found = result
            .records
            .iter()
            .filter(|record| record.pubmed_doi != NOT_FOUND || record.europe_pmc_doi != NOT_FOUND)
            .count();
        let direct = result
            .records
            .iter()
            .filter(|record| record.evidence_type == EvidenceType::Direct)
            .count();

        println!("{CYAN}Placenta literature summary{RESET}");
        println!(
            "{GREEN}Entities analyzed: {} (column '{}'){RESET}",
            result.entity_count, result.column
        );
        println!("{GREEN}With a DOI: {found}{RESET}");
        println!("{GREEN}Direct placenta evidence: {direct}{RESET}");
        println!("{CYAN}Results: {}{RESET}", result.output);
        println!("{YELLOW}Elapsed: {} ms{RESET}", result.elapsed_ms);
    }

    pub fn print_scan(result: &ScanSummary) {
        println!("{CYAN}PDF scan summary{RESET}");
        println!(
            "{GREEN}Documents: {}  rows: {}{RESET}",
            result.documents.len(),
            result.records.len()
        );
        for doc in &result.documents {
            if let Some(error) = &doc.error {
                println!("{RED}  x {}: {error}{RESET}", doc.file_name);
                continue;
            }
            let context = if doc.placenta_context {
                "placenta context"
            } else {
                "no placenta context"
            };
            let color = if doc.placenta_context { GREEN } else { YELLOW };
            println!(
                "{color}  - {} ({} mentions, {context}, {} OCR pages){RESET}",
                doc.file_name,
                doc.mentions.len(),
                doc.ocr_pages
            );
            for warning in &doc.warnings {
                println!("{YELLOW}      ! {warning}{RESET}");
            }
        }
        println!("{CYAN}Results: {}{RESET}", result.output);
    }

    pub fn print_classify(result: &[ClassifyResult]) {
        for row in result {
            println!("{GREEN}{}{RESET}\t{}\t{}", row.entity, row.pathway, row.scholar_link);
        }
    }
}

/// Progress lines on stderr so stdout stays clean.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr().lock();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(
                stderr,
                "{CYAN}[{:>6.1}s]{RESET} {}",
                elapsed.as_secs_f64(),
                event.message
            ),
            None => writeln!(stderr, "{CYAN}[   ...]{RESET} {}", event.message),
        };
    }
}
