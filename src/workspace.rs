use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;

use crate::error::LitError;

static RESULT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Project-local directory for uploaded inputs and generated result files.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Result<Self, LitError> {
        let cwd = std::env::current_dir().map_err(|err| LitError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd.join(".placenta-lit"))
            .map_err(|_| LitError::Filesystem("invalid workspace path".to_string()))?;
        Ok(Self { root })
    }

    pub fn with_root(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_path(path: &Path) -> Result<Self, LitError> {
        let root = Utf8PathBuf::from_path_buf(path.to_path_buf())
            .map_err(|_| LitError::Filesystem(format!("non UTF-8 path: {}", path.display())))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> Utf8PathBuf {
        self.root.join("uploads")
    }

    pub fn results_dir(&self) -> Utf8PathBuf {
        self.root.join("results")
    }

    pub fn ensure(&self) -> Result<(), LitError> {
        for dir in [self.uploads_dir(), self.results_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| LitError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    /// A fresh directory for one upload request. Concurrent requests never
    /// share a directory, even within the same millisecond.
    pub fn upload_batch_dir(&self, label: &str) -> Result<Utf8PathBuf, LitError> {
        let uploads = self.uploads_dir();
        fs::create_dir_all(uploads.as_std_path())
            .map_err(|err| LitError::Filesystem(err.to_string()))?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let dir = tempfile::Builder::new()
            .prefix(&format!("{label}-{stamp}-"))
            .rand_bytes(6)
            .tempdir_in(uploads.as_std_path())
            .map_err(|err| LitError::Filesystem(err.to_string()))?
            .keep();
        Utf8PathBuf::from_path_buf(dir)
            .map_err(|dir| LitError::Filesystem(format!("non UTF-8 path: {}", dir.display())))
    }

    pub fn result_path(&self, stem: &str) -> Utf8PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let sequence = RESULT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        self.results_dir().join(format!("{stem}-{stamp}-{sequence}.xlsx"))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), LitError> {
        let parent = path
            .parent()
            .ok_or_else(|| LitError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| LitError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| LitError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| LitError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let workspace = Workspace::with_root("/tmp/plit");
        assert!(workspace.uploads_dir().ends_with("uploads"));
        let result = workspace.result_path("analysis");
        assert!(result.starts_with("/tmp/plit/results"));
        assert_eq!(result.extension(), Some("xlsx"));
    }

    #[test]
    fn upload_names_are_flattened() {
        assert_eq!(
            sanitize_file_name("../../etc/genes.xlsx").as_deref(),
            Some("genes.xlsx")
        );
        assert_eq!(sanitize_file_name("C:\\data\\paper.pdf").as_deref(), Some("paper.pdf"));
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("dir/"), None);
    }

    #[test]
    fn every_request_gets_its_own_directory() {
        let temp = tempfile::tempdir().unwrap();
        let workspace = Workspace::from_path(temp.path()).unwrap();
        let first = workspace.upload_batch_dir("sheet").unwrap();
        let second = workspace.upload_batch_dir("sheet").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with(workspace.uploads_dir()));
        assert!(first.file_name().unwrap().starts_with("sheet-"));
        assert!(second.is_dir());

        assert_ne!(workspace.result_path("analysis"), workspace.result_path("analysis"));
    }
}
