use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

pub mod direct;
pub mod local;
pub mod youtube;

use crate::config::ToolsConfig;
use crate::Result;

/// Base name (without extension) of the fetched media file in a job directory
pub const FETCHED_STEM: &str = "video";

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
    Opus,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
            AudioFormat::Opus => "opus",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            "opus" => Some(AudioFormat::Opus),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the pipeline can use this container as-is
    pub fn is_pipeline_ready(&self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::M4a)
    }
}

/// Whether a fetched file has to be transcoded before use
pub fn needs_transcode(path: &Path) -> bool {
    !AudioFormat::from_path(path)
        .map(|format| format.is_pipeline_ready())
        .unwrap_or(false)
}

/// Fetches the source media of a job into its working directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Fetch `source` into `work_dir` and return the local file path
    async fn fetch(&self, source: &str, work_dir: &Path) -> Result<PathBuf>;
}

/// Trait for fetching media from one kind of source
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Check if this extractor supports the given source
    fn supports_source(&self, source: &str) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;

    /// Download the media into `work_dir` and return the resulting file
    async fn fetch_into(&self, source: &str, work_dir: &Path) -> Result<PathBuf>;
}

/// Registry for managing multiple extractors
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MediaExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new registry with default extractors
    ///
    /// Order matters: the first extractor that supports a source wins, and
    /// yt-dlp accepts any http(s) URL so it goes last.
    pub fn new(tools: &ToolsConfig) -> Self {
        let mut registry = Self {
            extractors: Vec::new(),
        };

        registry.register(Box::new(local::LocalFileExtractor::new()));
        registry.register(Box::new(direct::DirectExtractor::new()));
        registry.register(Box::new(youtube::YoutubeExtractor::new(&tools.yt_dlp)));

        registry
    }

    /// Register a new extractor
    pub fn register(&mut self, extractor: Box<dyn MediaExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that supports the given source
    pub fn find_extractor(&self, source: &str) -> Option<&dyn MediaExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.supports_source(source))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .map(|extractor| extractor.platform_name())
            .collect()
    }
}

#[async_trait]
impl AudioFetcher for ExtractorRegistry {
    async fn fetch(&self, source: &str, work_dir: &Path) -> Result<PathBuf> {
        let extractor = self
            .find_extractor(source)
            .ok_or_else(|| anyhow::anyhow!("No extractor found for source: {}", source))?;

        tracing::info!(platform = extractor.platform_name(), "Fetching {}", source);

        extractor.fetch_into(source, work_dir).await
    }
}

/// Validate and normalize URLs
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed)
}
