//! Thin HTTP front end over the spreadsheet and PDF pipelines.
//!
//! Every upload request gets its own directory in the [`Workspace`]; the
//! blocking pipeline runs on tokio's blocking pool, which is also where the
//! app (and its HTTP clients) is built.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use camino::Utf8PathBuf;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::app::{App, NoopProgress, http_app};
use crate::config::ResolvedConfig;
use crate::error::LitError;
use crate::extract::{PdfTextExtractor, TextExtractor};
use crate::providers::europe_pmc::{EuropePmcClient, EuropePmcHttpClient};
use crate::providers::pubmed::{PubmedClient, PubmedHttpClient};
use crate::sheet::SheetFormat;
use crate::workspace::{Workspace, sanitize_file_name};

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const DOWNLOAD_NAME: &str = "analysis_output.xlsx";

type AppFactory<P, E> = dyn Fn(ResolvedConfig) -> Result<App<P, E>, LitError> + Send + Sync;
type ExtractorFactory = dyn Fn(&ResolvedConfig) -> Box<dyn TextExtractor> + Send + Sync;

pub struct ServerState<P: PubmedClient, E: EuropePmcClient> {
    config: ResolvedConfig,
    workspace: Workspace,
    make_app: Box<AppFactory<P, E>>,
    make_extractor: Box<ExtractorFactory>,
    last_output: Mutex<Option<Utf8PathBuf>>,
}

impl ServerState<PubmedHttpClient, EuropePmcHttpClient> {
    /// Live PubMed and Europe PMC clients, pdf-extract text plus OCR when available.
    pub fn new(config: ResolvedConfig, workspace: Workspace) -> Self {
        Self::with_factories(
            config,
            workspace,
            http_app,
            |config: &ResolvedConfig| -> Box<dyn TextExtractor> {
                Box::new(PdfTextExtractor::from_environment(config.ocr))
            },
        )
    }
}

impl<P: PubmedClient, E: EuropePmcClient> ServerState<P, E> {
    /// Both factories are called on the blocking pool, once per request.
    pub fn with_factories<A, X>(
        config: ResolvedConfig,
        workspace: Workspace,
        make_app: A,
        make_extractor: X,
    ) -> Self
    where
        A: Fn(ResolvedConfig) -> Result<App<P, E>, LitError> + Send + Sync + 'static,
        X: Fn(&ResolvedConfig) -> Box<dyn TextExtractor> + Send + Sync + 'static,
    {
        Self {
            config,
            workspace,
            make_app: Box::new(make_app),
            make_extractor: Box::new(make_extractor),
            last_output: Mutex::new(None),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn last_output(&self) -> Option<Utf8PathBuf> {
        self.last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_last_output(&self, path: Utf8PathBuf) {
        *self
            .last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path);
    }
}

#[derive(Debug)]
pub enum ServerError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ServerError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ServerError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<LitError> for ServerError {
    fn from(err: LitError) -> Self {
        match err {
            LitError::MissingColumn { .. }
            | LitError::EmptyInput { .. }
            | LitError::UnsupportedSheetFormat(_)
            | LitError::SheetRead(_)
            | LitError::InvalidEntity(_)
            | LitError::NoDocuments(_) => ServerError::BadRequest(err.to_string()),
            other => {
                tracing::error!(error = %other, "request failed");
                ServerError::Internal(other.to_string())
            }
        }
    }
}

pub fn router<P, E>(state: Arc<ServerState<P, E>>) -> Router
where
    P: PubmedClient + 'static,
    E: EuropePmcClient + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/analyze", post(analyze::<P, E>))
        .route("/scan", post(scan::<P, E>))
        .route("/download", get(download::<P, E>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<P, E>(addr: SocketAddr, state: ServerState<P, E>) -> Result<(), LitError>
where
    P: PubmedClient + 'static,
    E: EuropePmcClient + 'static,
{
    state.workspace.ensure()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| LitError::Server(format!("bind {addr}: {err}")))?;
    tracing::info!(addr = %addr, workspace = %state.workspace.root(), "server listening");

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| LitError::Server(err.to_string()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(field: axum::extract::multipart::Field<'_>) -> Result<Upload, ServerError> {
    let file_name = field
        .file_name()
        .and_then(sanitize_file_name)
        .ok_or_else(|| ServerError::BadRequest("upload is missing a file name".to_string()))?;
    let bytes = field
        .bytes()
        .await
        .map_err(|err| ServerError::BadRequest(format!("failed to read upload: {err}")))?;
    Ok(Upload {
        file_name,
        bytes: bytes.to_vec(),
    })
}

async fn analyze<P, E>(
    State(state): State<Arc<ServerState<P, E>>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServerError>
where
    P: PubmedClient + 'static,
    E: EuropePmcClient + 'static,
{
    let mut upload = None;
    let mut column = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::BadRequest(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => upload = Some(read_upload(field).await?),
            "column" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ServerError::BadRequest(err.to_string()))?;
                if !value.trim().is_empty() {
                    column = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ServerError::BadRequest("No file uploaded".to_string()))?;
    SheetFormat::from_path(Path::new(&upload.file_name))?;

    state.workspace.ensure()?;
    let input = state
        .workspace
        .upload_batch_dir("sheet")?
        .join(&upload.file_name);
    Workspace::write_bytes_atomic(&input, &upload.bytes)?;
    let output = state.workspace.result_path("analysis");
    let column = column.unwrap_or_else(|| state.config.column.clone());
    tracing::info!(input = %input, column = %column, "spreadsheet upload received");

    let job_state = Arc::clone(&state);
    let job_output = output.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let app = (job_state.make_app)(job_state.config.clone())?;
        app.run_spreadsheet(
            input.as_std_path(),
            &column,
            job_output.as_std_path(),
            &NoopProgress,
        )
    })
    .await
    .map_err(|err| ServerError::Internal(err.to_string()))??;

    state.set_last_output(output);
    Ok(Json(json!({
        "status": "Analysis complete",
        "rows": summary.records.len(),
    })))
}

async fn scan<P, E>(
    State(state): State<Arc<ServerState<P, E>>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServerError>
where
    P: PubmedClient + 'static,
    E: EuropePmcClient + 'static,
{
    let mut uploads = Vec::new();
    // lower-cased, so a case-insensitive filesystem cannot merge two parts either
    let mut seen = HashSet::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::BadRequest(err.to_string()))?
    {
        if matches!(field.name(), Some("files") | Some("file")) {
            let upload = read_upload(field).await?;
            if !upload.file_name.to_ascii_lowercase().ends_with(".pdf") {
                return Err(ServerError::BadRequest(format!(
                    "not a PDF: {}",
                    upload.file_name
                )));
            }
            if !seen.insert(upload.file_name.to_lowercase()) {
                return Err(ServerError::BadRequest(format!(
                    "duplicate file name: {}",
                    upload.file_name
                )));
            }
            uploads.push(upload);
        }
    }
    if uploads.is_empty() {
        return Err(ServerError::BadRequest("No PDF files uploaded".to_string()));
    }

    state.workspace.ensure()?;
    let batch = state.workspace.upload_batch_dir("pdfs")?;
    for upload in &uploads {
        Workspace::write_bytes_atomic(&batch.join(&upload.file_name), &upload.bytes)?;
    }
    let output = state.workspace.result_path("scan");
    tracing::info!(batch = %batch, files = uploads.len(), "PDF upload received");

    let job_state = Arc::clone(&state);
    let job_output = output.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let extractor = (job_state.make_extractor)(&job_state.config);
        let app = (job_state.make_app)(job_state.config.clone())?;
        app.run_pdf_folder(
            batch.as_std_path(),
            &*extractor,
            job_output.as_std_path(),
            &NoopProgress,
        )
    })
    .await
    .map_err(|err| ServerError::Internal(err.to_string()))??;

    state.set_last_output(output);
    Ok(Json(json!({
        "status": "Scan complete",
        "documents": summary.documents.len(),
        "rows": summary.records.len(),
    })))
}

async fn download<P, E>(
    State(state): State<Arc<ServerState<P, E>>>,
) -> Result<Response, ServerError>
where
    P: PubmedClient + 'static,
    E: EuropePmcClient + 'static,
{
    let path = state
        .last_output()
        .ok_or_else(|| ServerError::NotFound("No analysis run yet".to_string()))?;
    let bytes = tokio::fs::read(path.as_std_path())
        .await
        .map_err(|err| ServerError::Internal(format!("read {path}: {err}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Placenta literature analyzer</title>
<style>
body { font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }
form { border: 1px solid #ccc; padding: 1rem; margin-bottom: 1rem; }
label { display: block; margin: 0.5rem 0; }
</style>
</head>
<body>
<h1>Placenta literature analyzer</h1>
<form action="/analyze" method="post" enctype="multipart/form-data">
<h2>Gene or metabolite spreadsheet</h2>
<label>File (.xlsx or .csv) <input type="file" name="file" accept=".xlsx,.csv" required></label>
<label>Column <input type="text" name="column" placeholder="Gene"></label>
<button type="submit">Analyze</button>
</form>
<form action="/scan" method="post" enctype="multipart/form-data">
<h2>PDF articles</h2>
<label>Files (.pdf) <input type="file" name="files" accept=".pdf" multiple required></label>
<button type="submit">Scan</button>
</form>
<p><a href="/download">Download the last result</a></p>
</body>
</html>
"#;
