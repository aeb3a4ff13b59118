use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use placenta_lit::app::App;
use placenta_lit::config::ResolvedConfig;
use placenta_lit::error::LitError;
use placenta_lit::extract::{ExtractedText, TextExtractor};
use placenta_lit::providers::europe_pmc::{EuropePmcClient, EuropePmcHit, EuropePmcHttpClient};
use placenta_lit::providers::pubmed::{PubmedArticle, PubmedClient, PubmedHttpClient};
use placenta_lit::server::{ServerState, router};
use placenta_lit::workspace::Workspace;

const BOUNDARY: &str = "plit-boundary";

type LiveState = ServerState<PubmedHttpClient, EuropePmcHttpClient>;

fn state(root: &Path) -> Arc<LiveState> {
    let workspace = Workspace::from_path(root).unwrap();
    Arc::new(ServerState::new(ResolvedConfig::default(), workspace))
}

struct StaticPubmed;

impl PubmedClient for StaticPubmed {
    fn search(&self, query: &str) -> Result<Option<PubmedArticle>, LitError> {
        Ok(Some(PubmedArticle {
            link: "https://pubmed.ncbi.nlm.nih.gov/1/".to_string(),
            doi: Some("10.1016/j.placenta.2020.01.001".to_string()),
            title: Some(format!("{query} in trophoblast")),
            abstract_text: None,
        }))
    }
}

struct EmptyEuropePmc;

impl EuropePmcClient for EmptyEuropePmc {
    fn search(&self, _query: &str) -> Result<Option<EuropePmcHit>, LitError> {
        Ok(None)
    }
}

/// Every document reads as the same short abstract.
struct FixedText;

impl TextExtractor for FixedText {
    fn extract(&self, _path: &Path) -> Result<ExtractedText, LitError> {
        let text = "Placental TNF and TNF signalling.".to_string();
        Ok(ExtractedText {
            embedded_chars: text.len(),
            text,
            ocr_pages: 0,
            warnings: Vec::new(),
        })
    }
}

fn offline_state(root: &Path) -> Arc<ServerState<StaticPubmed, EmptyEuropePmc>> {
    let workspace = Workspace::from_path(root).unwrap();
    Arc::new(ServerState::with_factories(
        ResolvedConfig::default(),
        workspace,
        |config| Ok(App::new(StaticPubmed, EmptyEuropePmc, config)),
        |_: &ResolvedConfig| -> Box<dyn TextExtractor> { Box::new(FixedText) },
    ))
}

fn scan_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let mut request = multipart(parts);
    *request.uri_mut() = "/scan".parse().unwrap();
    request
}

/// Upload directories created under `uploads/`, one per request.
fn upload_dirs(root: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(root.join("uploads"))
        .unwrap()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}

fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, file_name, content) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file_name {
            Some(file_name) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            )),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body_request(body)
}

fn body_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn index_page_has_both_forms() {
    let temp = tempfile::tempdir().unwrap();
    let response = router(state(temp.path()))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("action=\"/analyze\""));
    assert!(html.contains("action=\"/scan\""));
}

#[tokio::test]
async fn health_reports_version() {
    let temp = tempfile::tempdir().unwrap();
    let response = router(state(temp.path()))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn download_before_any_run() {
    let temp = tempfile::tempdir().unwrap();
    let response = router(state(temp.path()))
        .oneshot(Request::get("/download").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No analysis run yet");
}

#[tokio::test]
async fn analyze_requires_a_file() {
    let temp = tempfile::tempdir().unwrap();
    let request = multipart(&[("column", None, "Gene")]);
    let response = router(state(temp.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn analyze_rejects_unknown_format() {
    let temp = tempfile::tempdir().unwrap();
    let request = multipart(&[("file", Some("genes.txt"), "Gene\nVEGFA\n")]);
    let response = router(state(temp.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analyze_reports_missing_column() {
    let temp = tempfile::tempdir().unwrap();
    let request = multipart(&[
        ("file", Some("genes.csv"), "Symbol\nVEGFA\n"),
        ("column", None, "Gene"),
    ]);
    let app_state = state(temp.path());
    let response = router(Arc::clone(&app_state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app_state.last_output().is_none());

    let dirs = upload_dirs(temp.path());
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].join("genes.csv").exists());
}

#[tokio::test]
async fn same_file_name_uploads_do_not_share_a_path() {
    let temp = tempfile::tempdir().unwrap();
    let app_state = offline_state(temp.path());
    for genes in ["Gene\nVEGFA\n", "Gene\nPGF\nLEP\n"] {
        let request = multipart(&[("file", Some("genes.csv"), genes)]);
        let response = router(Arc::clone(&app_state)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let mut uploaded = upload_dirs(temp.path())
        .iter()
        .map(|dir| std::fs::read_to_string(dir.join("genes.csv")).unwrap())
        .collect::<Vec<_>>();
    uploaded.sort();
    assert_eq!(uploaded, vec!["Gene\nPGF\nLEP\n", "Gene\nVEGFA\n"]);
}

#[tokio::test]
async fn analyze_then_download() {
    let temp = tempfile::tempdir().unwrap();
    let app_state = offline_state(temp.path());
    let request = multipart(&[
        ("file", Some("genes.csv"), "Gene\nVEGFA\nPGF\n"),
        ("column", None, "Gene"),
    ]);
    let response = router(Arc::clone(&app_state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Analysis complete");
    assert_eq!(json["rows"], 2);

    let output = app_state.last_output().unwrap();
    assert!(output.starts_with(app_state.workspace().results_dir()));

    let response = router(Arc::clone(&app_state))
        .oneshot(Request::get("/download").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"analysis_output.xlsx\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // xlsx is a zip archive
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn scan_rejects_non_pdf() {
    let temp = tempfile::tempdir().unwrap();
    let request = scan_request(&[("files", Some("notes.docx"), "hello")]);
    let response = router(state(temp.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scan_rejects_duplicate_file_names() {
    let temp = tempfile::tempdir().unwrap();
    let app_state = offline_state(temp.path());
    let request = scan_request(&[
        ("files", Some("paper.pdf"), "%PDF-1.4 first"),
        ("files", Some("nested/Paper.PDF"), "%PDF-1.4 second"),
    ]);
    let response = router(Arc::clone(&app_state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("duplicate file name"));
    assert!(app_state.last_output().is_none());
}

#[tokio::test]
async fn scan_reports_documents_and_rows() {
    let temp = tempfile::tempdir().unwrap();
    let app_state = offline_state(temp.path());
    let request = scan_request(&[
        ("files", Some("a.pdf"), "%PDF-1.4"),
        ("files", Some("b.pdf"), "%PDF-1.4"),
    ]);
    let response = router(Arc::clone(&app_state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Scan complete");
    assert_eq!(json["documents"], 2);
    // TNF twice in each document
    assert_eq!(json["rows"], 2);
    assert!(app_state.last_output().is_some());
}
