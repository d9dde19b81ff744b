//! Karaoke jobs: the data model, the registry and the orchestrator.
//!
//! A [`Job`] is only ever mutated through its state-machine methods, which keep
//! `(status, progress)` on the fixed pipeline checkpoints and freeze the record
//! once it reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod orchestrator;
pub mod registry;

pub use orchestrator::Orchestrator;
pub use registry::JobRegistry;

use crate::pipeline::Stage;
use crate::{ErrorKind, KaraokeError};

/// Opaque job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A karaoke request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    /// Video URL or local media file
    #[serde(alias = "youtube_url", alias = "url")]
    pub source_url: String,

    /// Lyrics text to use instead of the transcription
    #[serde(default)]
    pub lyrics: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,
}

impl JobInput {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            lyrics: None,
            title: None,
            artist: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = Some(lyrics.into());
        self
    }

    /// Supplied lyrics, if they contain anything
    pub fn supplied_lyrics(&self) -> Option<&str> {
        self.lyrics.as_deref().filter(|lyrics| !lyrics.trim().is_empty())
    }
}

/// Progress of a job that has not started yet
pub const PENDING_PROGRESS: u8 = 0;

/// Progress of a completed job
pub const COMPLETED_PROGRESS: u8 = 100;

/// Full job record held by the registry
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub input: JobInput,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub result_location: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id,
            input,
            status: JobStatus::Pending,
            progress: PENDING_PROGRESS,
            message: "Job created".to_string(),
            result_location: None,
            error: None,
            error_kind: None,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Update the message of a job that has not started processing
    pub fn set_pending_message(&mut self, message: impl Into<String>) {
        if self.status == JobStatus::Pending {
            self.message = message.into();
            self.touch();
        }
    }

    /// Move to the checkpoint of `stage`
    pub fn enter_stage(&mut self, stage: Stage) {
        let checkpoint = stage.checkpoint();
        if checkpoint < self.progress {
            tracing::warn!(
                job_id = %self.id,
                stage = %stage,
                progress = self.progress,
                "Ignoring stage transition that would move progress backwards"
            );
            return;
        }

        self.status = JobStatus::Processing;
        self.progress = checkpoint;
        self.message = stage.message().to_string();
        self.touch();
    }

    /// Replace the current message, keeping it as a note that outlives later messages
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.message = note.clone();
        self.notes.push(note);
        self.touch();
    }

    pub fn complete(&mut self, result_location: impl Into<String>, message: impl Into<String>) {
        self.status = JobStatus::Completed;
        self.progress = COMPLETED_PROGRESS;
        self.message = message.into();
        self.result_location = Some(result_location.into());
        self.touch();
    }

    /// Record a failure, progress stays at the last checkpoint
    pub fn fail(&mut self, error: &KaraokeError) {
        let detail = error.to_string();
        self.status = JobStatus::Failed;
        self.message = format!("Error: {}", detail);
        self.error = Some(detail);
        self.error_kind = Some(error.kind());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            result_location: self.result_location.clone(),
            error: self.error.clone(),
            error_kind: self.error_kind,
            notes: self.notes.clone(),
            title: self.input.title.clone(),
            source_url: self.input.source_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only projection of a job returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobView {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobId::new(), JobInput::new("https://example.com/v"))
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.result_location.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_stage_checkpoints_are_monotonic() {
        let mut job = job();
        job.enter_stage(Stage::Separate);
        assert_eq!((job.status, job.progress), (JobStatus::Processing, 30));

        job.enter_stage(Stage::Fetch);
        assert_eq!(job.progress, 30);

        job.enter_stage(Stage::Render);
        assert_eq!(job.progress, 70);
        assert_eq!(job.message, Stage::Render.message());
    }

    #[test]
    fn test_fail_keeps_last_checkpoint() {
        let mut job = job();
        job.enter_stage(Stage::Fetch);
        job.enter_stage(Stage::Separate);
        job.fail(&KaraokeError::Separation(anyhow::anyhow!("spleeter crashed")));

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 30);
        assert_eq!(job.error_kind, Some(ErrorKind::Separation));
        assert_eq!(job.error.as_deref(), Some("Failed to remove vocals: spleeter crashed"));
        assert!(job.message.starts_with("Error: "));
    }

    #[test]
    fn test_pending_message_only_while_pending() {
        let mut job = job();
        job.set_pending_message("Queued");
        assert_eq!(job.message, "Queued");

        job.enter_stage(Stage::Fetch);
        job.set_pending_message("Queued again");
        assert_eq!(job.message, Stage::Fetch.message());
    }

    #[test]
    fn test_job_id_round_trips_through_text() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_input_accepts_legacy_field_name() {
        let input: JobInput = serde_json::from_str(
            r#"{"youtube_url": "https://youtu.be/x", "title": "My Song"}"#,
        )
        .unwrap();
        assert_eq!(input.source_url, "https://youtu.be/x");
        assert_eq!(input.title.as_deref(), Some("My Song"));
        assert!(input.supplied_lyrics().is_none());
    }
}
