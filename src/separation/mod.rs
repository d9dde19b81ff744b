//! Vocal separation.
//!
//! Separation engines write their stems into a tool-specific nested layout. The
//! accompaniment file is located with [`resolve_accompaniment`], which walks an
//! ordered list of known layouts and returns the first one that exists.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use crate::config::{SeparationConfig, ToolsConfig};
use crate::tools::{self, ToolCommand};
use crate::Result;

/// Known accompaniment locations relative to the separation output directory.
///
/// `{stem}` is replaced by the input file name without extension.
pub const ACCOMPANIMENT_CANDIDATES: &[&str] = &[
    // spleeter 2stems
    "{stem}/accompaniment.wav",
    // spleeter with a flat filename format
    "accompaniment.wav",
    "{stem}_accompaniment.wav",
    // demucs --two-stems=vocals
    "htdemucs/{stem}/no_vocals.wav",
    "mdx_extra/{stem}/no_vocals.wav",
    "{stem}/no_vocals.wav",
];

#[derive(thiserror::Error, Debug)]
#[error("Separated accompaniment not found under {} (tried: {})", .output_dir.display(), .tried.join(", "))]
pub struct AccompanimentNotFound {
    pub output_dir: PathBuf,
    pub tried: Vec<String>,
}

/// Find the accompaniment produced for `input` inside `output_dir`
pub fn resolve_accompaniment(
    output_dir: &Path,
    input: &Path,
    candidates: &[&str],
) -> std::result::Result<PathBuf, AccompanimentNotFound> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tried = Vec::with_capacity(candidates.len());
    for template in candidates {
        let relative = template.replace("{stem}", &stem);
        let candidate = output_dir.join(&relative);
        if candidate.is_file() {
            tracing::debug!("Found accompaniment at {}", candidate.display());
            return Ok(candidate);
        }
        tried.push(relative);
    }

    Err(AccompanimentNotFound {
        output_dir: output_dir.to_path_buf(),
        tried,
    })
}

/// Splits an audio file into vocals and accompaniment
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VocalSeparator: Send + Sync {
    /// Whether the separation engine can be used at all
    async fn is_available(&self) -> bool;

    /// Separate `audio` into `output_dir` and return the accompaniment file
    async fn separate(&self, audio: &Path, output_dir: &Path) -> Result<PathBuf>;
}

/// spleeter command-line separator
pub struct SpleeterSeparator {
    spleeter_path: String,
    model: String,
    available: OnceCell<bool>,
}

impl SpleeterSeparator {
    pub fn new(tools: &ToolsConfig, config: &SeparationConfig) -> Self {
        Self {
            spleeter_path: tools.spleeter.clone(),
            model: config.model.clone(),
            available: OnceCell::new(),
        }
    }
}

#[async_trait]
impl VocalSeparator for SpleeterSeparator {
    async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let available = tools::is_available(&self.spleeter_path, "--help").await;
                if !available {
                    tracing::warn!("{} is not available, vocal separation disabled", self.spleeter_path);
                }
                available
            })
            .await
    }

    async fn separate(&self, audio: &Path, output_dir: &Path) -> Result<PathBuf> {
        tracing::debug!(model = %self.model, "Separating {}", audio.display());

        ToolCommand::new(&self.spleeter_path)
            .args(["separate", "-p", self.model.as_str(), "-o"])
            .arg(output_dir)
            .arg(audio)
            .run()
            .await?;

        Ok(resolve_accompaniment(output_dir, audio, ACCOMPANIMENT_CANDIDATES)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"wav").unwrap();
    }

    #[test]
    fn test_resolves_spleeter_layout() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("video/accompaniment.wav");
        touch(&expected);

        let found =
            resolve_accompaniment(dir.path(), Path::new("/job/video.mp3"), ACCOMPANIMENT_CANDIDATES).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_resolves_demucs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("htdemucs/audio/no_vocals.wav");
        touch(&expected);

        let found =
            resolve_accompaniment(dir.path(), Path::new("audio.mp3"), ACCOMPANIMENT_CANDIDATES).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_candidate_order_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("accompaniment.wav"));
        touch(&dir.path().join("song/accompaniment.wav"));

        let found = resolve_accompaniment(dir.path(), Path::new("song.mp3"), ACCOMPANIMENT_CANDIDATES).unwrap();
        assert_eq!(found, dir.path().join("song/accompaniment.wav"));
    }

    #[test]
    fn test_not_found_lists_every_candidate() {
        let dir = tempfile::tempdir().unwrap();
        // A directory with the right name is not an output file
        std::fs::create_dir_all(dir.path().join("song/accompaniment.wav")).unwrap();

        let err = resolve_accompaniment(dir.path(), Path::new("song.mp3"), ACCOMPANIMENT_CANDIDATES).unwrap_err();
        assert_eq!(err.tried.len(), ACCOMPANIMENT_CANDIDATES.len());
        assert_eq!(err.tried[0], "song/accompaniment.wav");
        assert!(err.to_string().contains("htdemucs/song/no_vocals.wav"));
    }

    #[tokio::test]
    async fn test_missing_engine_is_unavailable() {
        let tools = ToolsConfig {
            spleeter: "spleeter-binary-that-does-not-exist".to_string(),
            ..ToolsConfig::default()
        };
        let separator = SpleeterSeparator::new(&tools, &SeparationConfig::default());

        assert!(!separator.is_available().await);
        // Cached after the first probe
        assert!(!separator.is_available().await);
    }
}
