use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::LitError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub embedded_chars: usize,
    pub ocr_pages: usize,
    pub warnings: Vec<String>,
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedText, LitError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub pdftoppm: Option<String>,
    pub tesseract: Option<String>,
}

/// Renders pages with poppler's `pdftoppm` and reads them with `tesseract`.
#[derive(Debug, Clone)]
pub struct SystemOcr {
    pdftoppm: PathBuf,
    tesseract: PathBuf,
    dpi: u32,
}

impl SystemOcr {
    pub fn detect() -> Result<Self, LitError> {
        let pdftoppm =
            find_in_path("pdftoppm").ok_or_else(|| LitError::MissingTool("pdftoppm".to_string()))?;
        let tesseract = find_in_path("tesseract")
            .ok_or_else(|| LitError::MissingTool("tesseract".to_string()))?;
        Ok(Self {
            pdftoppm,
            tesseract,
            dpi: 300,
        })
    }

    pub fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            pdftoppm: tool_version(&self.pdftoppm, &["-v"]),
            tesseract: tool_version(&self.tesseract, &["--version"]),
        }
    }

    /// Returns one string per rendered page, in page order.
    pub fn ocr_pdf(&self, pdf: &Path) -> Result<Vec<String>, LitError> {
        let scratch = tempfile::Builder::new()
            .prefix("placenta-lit-ocr")
            .tempdir()
            .map_err(|err| LitError::Filesystem(err.to_string()))?;
        let prefix = scratch.path().join("page");
        let args = vec![
            "-r".to_string(),
            self.dpi.to_string(),
            "-gray".to_string(),
            "-png".to_string(),
            pdf.to_string_lossy().to_string(),
            prefix.to_string_lossy().to_string(),
        ];
        run_cmd(&self.pdftoppm, &args)?;

        let mut pages = find_exts(scratch.path(), "png");
        pages.sort();
        let mut texts = Vec::with_capacity(pages.len());
        for page in &pages {
            let args = vec![page.to_string_lossy().to_string(), "stdout".to_string()];
            let stdout = run_cmd(&self.tesseract, &args)?;
            texts.push(stdout);
        }
        Ok(texts)
    }
}

pub struct PdfTextExtractor {
    ocr: Option<SystemOcr>,
}

impl PdfTextExtractor {
    pub fn new(ocr: Option<SystemOcr>) -> Self {
        Self { ocr }
    }

    /// Enables OCR when requested and both tools are on `PATH`.
    pub fn from_environment(want_ocr: bool) -> Self {
        if !want_ocr {
            return Self::new(None);
        }
        match SystemOcr::detect() {
            Ok(ocr) => {
                let info = ocr.tool_info();
                tracing::info!(
                    pdftoppm = info.pdftoppm.as_deref().unwrap_or("unknown"),
                    tesseract = info.tesseract.as_deref().unwrap_or("unknown"),
                    "OCR enabled"
                );
                Self::new(Some(ocr))
            }
            Err(err) => {
                tracing::warn!(error = %err, "OCR disabled");
                Self::new(None)
            }
        }
    }

    pub fn ocr_enabled(&self) -> bool {
        self.ocr.is_some()
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, LitError> {
        let mut out = ExtractedText::default();
        let mut failures = Vec::new();

        // pdf-extract panics on some malformed fonts instead of returning an error
        match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
            Ok(Ok(text)) => {
                out.embedded_chars = text.chars().count();
                out.text.push_str(&text);
            }
            Ok(Err(err)) => {
                let message = format!("embedded text: {err}");
                tracing::warn!(path = %path.display(), "{message}");
                failures.push(message);
            }
            Err(_) => {
                let message = "embedded text: extractor panicked".to_string();
                tracing::warn!(path = %path.display(), "{message}");
                failures.push(message);
            }
        }

        if let Some(ocr) = &self.ocr {
            match ocr.ocr_pdf(path) {
                Ok(pages) => {
                    out.ocr_pages = pages.len();
                    for page in pages {
                        out.text.push('\n');
                        out.text.push_str(&page);
                    }
                }
                Err(err) => {
                    let message = format!("ocr: {err}");
                    tracing::warn!(path = %path.display(), "{message}");
                    failures.push(message);
                }
            }
        }

        if out.text.trim().is_empty() && !failures.is_empty() {
            return Err(LitError::TextExtraction(format!(
                "{}: {}",
                path.display(),
                failures.join("; ")
            )));
        }
        out.warnings = failures;
        Ok(out)
    }
}

fn run_cmd(program: &Path, args: &[String]) -> Result<String, LitError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| LitError::Ocr(err.to_string()))?;
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("command failed: {}", program.display())
    } else {
        stderr
    };
    Err(LitError::Ocr(message))
}

/// First `PATH` entry holding `name` (or `name.exe`) as a regular file.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let candidates = [format!("{name}.exe"), name.to_string()];
    std::env::split_paths(&std::env::var_os("PATH")?)
        .flat_map(|dir| candidates.iter().map(move |candidate| dir.join(candidate)))
        .find(|path| path.is_file())
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    // pdftoppm prints its version on stderr
    let raw = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    String::from_utf8_lossy(&raw)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// Recursively collects files with `ext` (case-insensitive). Symlinked
/// directories are listed by their own type and never descended into.
pub fn find_exts(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if has_extension(&path, ext) {
                found.push(path);
            }
        }
    }
    found
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|value| value.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_exts_is_recursive_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.pdf"), b"").unwrap();
        fs::write(nested.join("b.PDF"), b"").unwrap();
        fs::write(nested.join("c.txt"), b"").unwrap();

        let mut found = find_exts(dir.path(), "pdf");
        found.sort();
        assert_eq!(found.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.pdf"), b"").unwrap();
        // nested/loop -> root would recurse forever if followed
        std::os::unix::fs::symlink(dir.path(), nested.join("loop")).unwrap();
        std::os::unix::fs::symlink(nested.join("a.pdf"), dir.path().join("link.pdf")).unwrap();

        let mut found = find_exts(dir.path(), "pdf");
        found.sort();
        assert_eq!(found, vec![dir.path().join("link.pdf"), nested.join("a.pdf")]);
    }

    #[test]
    fn tools_are_found_on_path() {
        // `sh` is on PATH on every unix test host
        if cfg!(unix) {
            assert!(find_in_path("sh").is_some());
        }
        assert!(find_in_path("placenta-lit-no-such-tool").is_none());
    }

    #[test]
    fn unreadable_pdf_without_ocr_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"not a pdf").unwrap();

        let extractor = PdfTextExtractor::new(None);
        assert!(extractor.extract(&path).is_err());
    }
}
