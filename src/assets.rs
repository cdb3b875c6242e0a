//! Asset Loading - Explicit Collaborator for Report Initialization

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::report::ReportError;

/// Reads static assets (logos, images) that reports embed during `init`.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, relative_path: &str) -> Result<Vec<u8>, ReportError>;
}

/// Assets served from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetLoader for FsAssetLoader {
    async fn load(&self, relative_path: &str) -> Result<Vec<u8>, ReportError> {
        let path = self.root.join(relative_path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "asset loaded");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ReportError::AssetNotFound(path)),
            Err(e) => Err(ReportError::Io(e)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, relative_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(relative_path.into(), bytes.into());
        self
    }
}

#[async_trait]
impl AssetLoader for MemoryAssets {
    async fn load(&self, relative_path: &str) -> Result<Vec<u8>, ReportError> {
        self.files
            .get(relative_path)
            .cloned()
            .ok_or_else(|| ReportError::AssetNotFound(PathBuf::from(relative_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_loader_reads_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/logo.svg"), b"<svg/>").unwrap();

        let loader = FsAssetLoader::new(dir.path());
        assert_eq!(loader.load("img/logo.svg").await.unwrap(), b"<svg/>");

        let err = loader.load("img/missing.svg").await.unwrap_err();
        assert!(matches!(err, ReportError::AssetNotFound(p) if p.ends_with("img/missing.svg")));
    }
}
