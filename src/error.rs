use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LitError {
    #[error("invalid entity name: {0:?}")]
    InvalidEntity(String),

    #[error("column '{column}' not found in {path}")]
    #[diagnostic(help("pass --column with one of the header names in the first row"))]
    MissingColumn { column: String, path: String },

    #[error("no entities found in column '{column}' of {path}")]
    EmptyInput { column: String, path: String },

    #[error("unsupported spreadsheet format: {0} (expected .xlsx or .csv)")]
    UnsupportedSheetFormat(String),

    #[error("failed to read spreadsheet: {0}")]
    SheetRead(String),

    #[error("failed to write spreadsheet: {0}")]
    SheetWrite(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("PubMed request failed: {0}")]
    PubmedHttp(String),

    #[error("PubMed returned status {status}: {message}")]
    PubmedStatus { status: u16, message: String },

    #[error("Europe PMC request failed: {0}")]
    EuropePmcHttp(String),

    #[error("Europe PMC returned status {status}: {message}")]
    EuropePmcStatus { status: u16, message: String },

    #[error("no PDF documents found under {0}")]
    NoDocuments(String),

    #[error("text extraction failed: {0}")]
    TextExtraction(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("server error: {0}")]
    Server(String),
}
