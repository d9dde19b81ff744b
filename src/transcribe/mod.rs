use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::OnceCell;

use crate::config::{ToolsConfig, TranscriptionConfig};
use crate::tools::{self, expect_output, ToolCommand};
use crate::Result;

pub mod align;
pub mod processor;

pub use align::pair_supplied_lyrics;

/// Timed lyrics produced by the transcription stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsTiming {
    /// The full lyrics text
    pub text: String,

    /// Ordered segments with timestamps
    pub segments: Vec<TimedSegment>,

    /// Word-level timestamps (if the engine produced them)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,

    /// Language detected by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A span of lyric text with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    /// Start time in seconds
    pub start_seconds: f64,

    /// End time in seconds
    pub end_seconds: f64,

    /// Segment text
    pub text: String,
}

/// A single recognised word with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_seconds: f64,
    pub end_seconds: f64,

    /// Recognition probability (0.0 to 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl TimedSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end_seconds - self.start_seconds).max(0.0)
    }
}

/// Speech-to-text engine producing timed segments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio`, using `work_dir` for any intermediate files
    async fn transcribe(&self, audio: &Path, work_dir: &Path) -> Result<LyricsTiming>;
}

/// openai-whisper command-line transcriber
///
/// One instance is shared by every job. The engine check runs once, lazily, on
/// the first transcription.
pub struct WhisperTranscriber {
    whisper_path: String,
    config: TranscriptionConfig,
    ready: OnceCell<()>,
}

impl WhisperTranscriber {
    pub fn new(tools: &ToolsConfig, config: TranscriptionConfig) -> Self {
        Self {
            whisper_path: tools.whisper.clone(),
            config,
            ready: OnceCell::new(),
        }
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                if !tools::is_available(&self.whisper_path, "--help").await {
                    anyhow::bail!(
                        "Whisper not installed. Please install openai-whisper ({} not found)",
                        self.whisper_path
                    );
                }
                tracing::info!(model = %self.config.model, "Whisper engine ready");
                Ok(())
            })
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path, work_dir: &Path) -> Result<LyricsTiming> {
        self.ensure_ready().await?;

        let output_dir = work_dir.join("transcript");
        fs_err::create_dir_all(&output_dir)?;

        let mut command = ToolCommand::new(&self.whisper_path)
            .arg(audio)
            .args(["--model", self.config.model.as_str()])
            .args(["--output_format", "json", "--word_timestamps", "True", "--verbose", "False"])
            .arg("--output_dir")
            .arg(&output_dir);

        if let Some(language) = &self.config.language {
            command = command.args(["--language", language.as_str()]);
        }

        tracing::info!("Transcribing {}", audio.display());
        command.run().await?;

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let json_path = expect_output(&output_dir.join(format!("{}.json", stem)))?;

        let content = fs_err::read_to_string(&json_path)?;
        let timing = processor::parse_whisper_json(&content).context("Whisper transcription failed")?;

        tracing::debug!(segments = timing.segments.len(), "Transcription parsed");
        Ok(timing)
    }
}
