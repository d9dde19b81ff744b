//! Karaoke Forge - turn a YouTube video into a karaoke video
//!
//! This library downloads the audio of a video, strips the vocals, syncs lyrics
//! against a transcription and renders a video with the lyrics burned in. The work
//! runs as background jobs whose status can be polled through the [`JobRegistry`].

pub mod cli;
pub mod config;
pub mod extractors;
pub mod jobs;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod separation;
pub mod tools;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use jobs::{JobId, JobInput, JobRegistry, JobStatus, JobView, Orchestrator};
pub use pipeline::{KaraokePipeline, Stage, Toolchain};
pub use transcribe::{LyricsTiming, TimedSegment, Transcriber};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the karaoke pipeline
///
/// Stage variants keep the underlying tool failure as their source so the full
/// chain is available for diagnostics.
#[derive(thiserror::Error, Debug)]
pub enum KaraokeError {
    #[error("Failed to download video: {0:#}")]
    Fetch(#[source] anyhow::Error),

    #[error("Failed to remove vocals: {0:#}")]
    Separation(#[source] anyhow::Error),

    #[error("Failed to process lyrics: {0:#}")]
    Transcription(#[source] anyhow::Error),

    #[error("Failed to render video: {0:#}")]
    Render(#[source] anyhow::Error),

    #[error("Failed to publish video: {0:#}")]
    Publish(#[source] anyhow::Error),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job queue is full ({0} jobs waiting or running)")]
    QueueFull(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job execution aborted: {0}")]
    Aborted(String),
}

/// Tag identifying which part of the taxonomy an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "FetchError")]
    Fetch,
    #[serde(rename = "SeparationError")]
    Separation,
    #[serde(rename = "TranscriptionError")]
    Transcription,
    #[serde(rename = "RenderError")]
    Render,
    #[serde(rename = "PublishError")]
    Publish,
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "QueueFullError")]
    QueueFull,
    #[serde(rename = "InvalidRequestError")]
    InvalidRequest,
    #[serde(rename = "AbortedError")]
    Aborted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "FetchError",
            ErrorKind::Separation => "SeparationError",
            ErrorKind::Transcription => "TranscriptionError",
            ErrorKind::Render => "RenderError",
            ErrorKind::Publish => "PublishError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::QueueFull => "QueueFullError",
            ErrorKind::InvalidRequest => "InvalidRequestError",
            ErrorKind::Aborted => "AbortedError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KaraokeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KaraokeError::Fetch(_) => ErrorKind::Fetch,
            KaraokeError::Separation(_) => ErrorKind::Separation,
            KaraokeError::Transcription(_) => ErrorKind::Transcription,
            KaraokeError::Render(_) => ErrorKind::Render,
            KaraokeError::Publish(_) => ErrorKind::Publish,
            KaraokeError::NotFound(_) => ErrorKind::NotFound,
            KaraokeError::QueueFull(_) => ErrorKind::QueueFull,
            KaraokeError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            KaraokeError::Aborted(_) => ErrorKind::Aborted,
        }
    }
}
