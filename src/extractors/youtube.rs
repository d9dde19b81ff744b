use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{validate_url, MediaExtractor, FETCHED_STEM};
use crate::tools::{ToolCommand, ToolError};
use crate::Result;

/// YouTube (and anything else yt-dlp understands) extractor
pub struct YoutubeExtractor {
    yt_dlp_path: String,
}

impl YoutubeExtractor {
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.to_string(),
        }
    }

    /// Output template handed to yt-dlp, the extension is picked by the tool
    fn output_template(work_dir: &Path) -> String {
        work_dir
            .join(format!("{}.%(ext)s", FETCHED_STEM))
            .to_string_lossy()
            .into_owned()
    }

    /// Resolve the downloaded file from yt-dlp's printed path, or by scanning the directory
    fn resolve_download(stdout: &str, work_dir: &Path) -> std::result::Result<PathBuf, ToolError> {
        if let Some(printed) = stdout.lines().rev().map(str::trim).find(|line| !line.is_empty()) {
            let path = PathBuf::from(printed);
            if path.is_file() {
                return Ok(path);
            }
        }

        let prefix = format!("{}.", FETCHED_STEM);
        let found = std::fs::read_dir(work_dir)
            .map_err(|e| ToolError::Io {
                program: "yt-dlp".to_string(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with(&prefix) && !name.ends_with(".part"))
                    .unwrap_or(false)
            })
            .min();

        found.ok_or_else(|| ToolError::MissingOutput {
            path: PathBuf::from(Self::output_template(work_dir)),
        })
    }
}

#[async_trait]
impl MediaExtractor for YoutubeExtractor {
    fn supports_source(&self, source: &str) -> bool {
        validate_url(source).is_ok()
    }

    fn platform_name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_into(&self, source: &str, work_dir: &Path) -> Result<PathBuf> {
        tracing::debug!("Downloading best audio for: {}", source);

        let template = Self::output_template(work_dir);
        let stdout = ToolCommand::new(&self.yt_dlp_path)
            .args([
                "--format",
                "bestaudio/best",
                "--output",
                template.as_str(),
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "--print",
                "after_move:filepath",
                source,
            ])
            .run_stdout()
            .await?;

        Ok(Self::resolve_download(&stdout, work_dir)?)
    }
}
