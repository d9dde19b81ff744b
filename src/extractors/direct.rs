use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

use super::{validate_url, MediaExtractor, FETCHED_STEM};
use crate::Result;

/// Extensions that identify a direct link to a media file
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "wav", "flac", "ogg", "aac", "opus", "mp4", "avi", "mov", "mkv", "webm", "m4v",
];

/// Direct URL extractor for audio and video files
pub struct DirectExtractor {
    client: Client,
}

impl DirectExtractor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Extension of the media file a URL points to, if it looks like one
    fn media_extension(url: &Url) -> Option<String> {
        let filename = url.path_segments()?.last()?;
        let filename = urlencoding::decode(filename)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| filename.to_string());

        let extension = Path::new(&filename).extension()?.to_str()?.to_lowercase();

        MEDIA_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }
}

#[async_trait]
impl MediaExtractor for DirectExtractor {
    fn supports_source(&self, source: &str) -> bool {
        validate_url(source)
            .ok()
            .and_then(|url| Self::media_extension(&url))
            .is_some()
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }

    async fn fetch_into(&self, source: &str, work_dir: &Path) -> Result<PathBuf> {
        let url = validate_url(source)?;
        let extension = Self::media_extension(&url)
            .ok_or_else(|| anyhow::anyhow!("URL does not point to a media file: {}", source))?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download media: HTTP {}", response.status());
        }

        // Stream into a temp file so a half-written download never looks like an artifact
        let mut file = tempfile::NamedTempFile::new_in(work_dir)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
        }

        if downloaded == 0 {
            anyhow::bail!("Downloaded media is empty: {}", source);
        }

        let target = work_dir.join(format!("{}.{}", FETCHED_STEM, extension));
        file.persist(&target)?;

        tracing::debug!(bytes = downloaded, "Downloaded {}", target.display());
        Ok(target)
    }
}

impl Default for DirectExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_media_links_only() {
        let extractor = DirectExtractor::new();
        assert!(extractor.supports_source("https://cdn.example.com/audio/track.mp3"));
        assert!(extractor.supports_source("https://cdn.example.com/My%20Clip.MP4?sig=abc"));
        assert!(!extractor.supports_source("https://www.youtube.com/watch?v=abc"));
        assert!(!extractor.supports_source("https://example.com/v"));
        assert!(!extractor.supports_source("/local/track.mp3"));
    }

    #[test]
    fn test_media_extension() {
        let url = Url::parse("https://cdn.example.com/a/b/Song%20Name.webm").unwrap();
        assert_eq!(DirectExtractor::media_extension(&url), Some("webm".to_string()));

        let url = Url::parse("https://cdn.example.com/page.html").unwrap();
        assert_eq!(DirectExtractor::media_extension(&url), None);
    }
}
