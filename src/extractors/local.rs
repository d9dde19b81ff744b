use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{MediaExtractor, FETCHED_STEM};
use crate::Result;

/// Extractor for media files already on disk
pub struct LocalFileExtractor;

impl LocalFileExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check if the file exists and is non-empty
    async fn validate_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("File does not exist: {}", path.display());
        }

        if !path.is_file() {
            anyhow::bail!("Path is not a file: {}", path.display());
        }

        match fs::metadata(path).await {
            Ok(metadata) => {
                if metadata.len() == 0 {
                    anyhow::bail!("File is empty: {}", path.display());
                }
            }
            Err(e) => {
                anyhow::bail!("Cannot access file {}: {}", path.display(), e);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MediaExtractor for LocalFileExtractor {
    fn supports_source(&self, source: &str) -> bool {
        // Anything carrying a scheme is a URL, never a local path
        if source.contains("://") {
            return false;
        }

        let path = Path::new(source);
        if path.exists() {
            return true;
        }

        let has_extension = path.extension().is_some();
        let has_path_separators = source.contains('/') || source.contains('\\');

        has_extension || has_path_separators
    }

    fn platform_name(&self) -> &'static str {
        "Local File"
    }

    async fn fetch_into(&self, source: &str, work_dir: &Path) -> Result<PathBuf> {
        let source_path = Path::new(source);
        self.validate_file(source_path).await?;

        // Copy so later stages never touch the caller's file
        let extension = source_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let target = work_dir.join(format!("{}.{}", FETCHED_STEM, extension));

        tracing::debug!("Copying local file: {} -> {}", source_path.display(), target.display());
        fs::copy(source_path, &target).await?;

        Ok(target)
    }
}

impl Default for LocalFileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_source() {
        let extractor = LocalFileExtractor::new();
        assert!(extractor.supports_source("./song.mp3"));
        assert!(extractor.supports_source("music/song"));
        assert!(!extractor.supports_source("https://example.com/song.mp3"));
        assert!(!extractor.supports_source("ftp://example.com/a"));
    }

    #[tokio::test]
    async fn test_fetch_copies_into_work_dir() {
        let source_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("Track.WAV");
        std::fs::write(&source, b"RIFF....").unwrap();

        let fetched = LocalFileExtractor::new()
            .fetch_into(source.to_str().unwrap(), work_dir.path())
            .await
            .unwrap();

        assert_eq!(fetched, work_dir.path().join("video.wav"));
        assert!(source.exists());
        assert_eq!(std::fs::read(&fetched).unwrap(), b"RIFF....");
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_file() {
        let source_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("empty.mp3");
        std::fs::write(&source, b"").unwrap();

        let err = LocalFileExtractor::new()
            .fetch_into(source.to_str().unwrap(), work_dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
