//! The karaoke pipeline.
//!
//! Each job runs five sequential stages: fetch, separate, lyrics, render and
//! publish. Every stage works inside the job's own directory under the work
//! root, and the first failure ends the job with the progress frozen where the
//! failing stage started.

use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod runner;

pub use runner::StageRunner;

use crate::config::{Config, RenderConfig};
use crate::extractors::{self, AudioFetcher, ExtractorRegistry};
use crate::jobs::{JobId, JobInput, JobRegistry};
use crate::media::{Composition, Ffmpeg, MediaEncoder};
use crate::output::ass;
use crate::publish::{LocalPublisher, Publisher};
use crate::separation::{SpleeterSeparator, VocalSeparator};
use crate::transcribe::{pair_supplied_lyrics, LyricsTiming, Transcriber, WhisperTranscriber};
use crate::utils::{format_duration, karaoke_filename};
use crate::KaraokeError;

const RAW_AUDIO_FILE: &str = "audio.mp3";
const SEPARATED_DIR: &str = "separated";
const INSTRUMENTAL_FILE: &str = "instrumental.mp3";
const LYRICS_FILE: &str = "lyrics.json";
const SUBTITLE_FILE: &str = "lyrics.ass";

const COMPLETED_MESSAGE: &str = "Karaoke video created! (Manual upload required)";
const PASSTHROUGH_NOTE: &str = "Vocal separation unavailable, using original audio (vocals not removed)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Separate,
    Lyrics,
    Render,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fetch,
        Stage::Separate,
        Stage::Lyrics,
        Stage::Render,
        Stage::Publish,
    ];

    /// Progress reported while the stage is running
    pub fn checkpoint(&self) -> u8 {
        match self {
            Stage::Fetch => 10,
            Stage::Separate => 30,
            Stage::Lyrics => 50,
            Stage::Render => 70,
            Stage::Publish => 90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Separate => "separate",
            Stage::Lyrics => "lyrics",
            Stage::Render => "render",
            Stage::Publish => "publish",
        }
    }

    /// Status message shown while the stage is running
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Fetch => "Downloading video...",
            Stage::Separate => "Removing vocals (this may take a few minutes)...",
            Stage::Lyrics => "Processing lyrics...",
            Stage::Render => "Rendering karaoke video...",
            Stage::Publish => "Finalizing...",
        }
    }

    pub fn wrap_error(&self, error: anyhow::Error) -> KaraokeError {
        match self {
            Stage::Fetch => KaraokeError::Fetch(error),
            Stage::Separate => KaraokeError::Separation(error),
            Stage::Lyrics => KaraokeError::Transcription(error),
            Stage::Render => KaraokeError::Render(error),
            Stage::Publish => KaraokeError::Publish(error),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    RawAudio,
    InstrumentalAudio,
    LyricsTiming,
    RenderedVideo,
}

/// A file produced by one stage and consumed by the next
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl PipelineArtifact {
    fn new(kind: ArtifactKind, path: PathBuf) -> Self {
        Self { kind, path }
    }
}

/// External collaborators used by the pipeline
#[derive(Clone)]
pub struct Toolchain {
    pub fetcher: Arc<dyn AudioFetcher>,
    pub separator: Arc<dyn VocalSeparator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub encoder: Arc<dyn MediaEncoder>,
    pub publisher: Arc<dyn Publisher>,
}

impl Toolchain {
    /// Build the production toolchain from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetcher: Arc::new(ExtractorRegistry::new(&config.tools)),
            separator: Arc::new(SpleeterSeparator::new(&config.tools, &config.separation)),
            transcriber: Arc::new(WhisperTranscriber::new(
                &config.tools,
                config.transcription.clone(),
            )),
            encoder: Arc::new(Ffmpeg::new(&config.tools, config.render.clone())),
            publisher: Arc::new(LocalPublisher::new(&config.publish)),
        }
    }
}

/// Runs karaoke jobs end to end
pub struct KaraokePipeline {
    tools: Toolchain,
    work_root: PathBuf,
    allow_passthrough: bool,
    render: RenderConfig,
}

impl KaraokePipeline {
    pub fn new(tools: Toolchain, config: &Config) -> Self {
        Self {
            tools,
            work_root: config.work_dir(),
            allow_passthrough: config.separation.allow_passthrough,
            render: config.render.clone(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Toolchain::from_config(config), config)
    }

    /// Private working directory of a job
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.work_root.join(id.to_string())
    }

    /// Execute every stage for a job and record the outcome in the registry
    pub async fn run(&self, registry: &JobRegistry, id: JobId, input: &JobInput) {
        let runner = StageRunner::new(registry, id);

        let outcome = match self.execute(&runner, input).await {
            Ok(location) => {
                tracing::info!(job_id = %id, result = %location, "Karaoke video ready");
                registry.update(&id, |job| {
                    let message = completion_message(&job.notes);
                    job.complete(location, message);
                })
            }
            Err(err) => {
                tracing::error!(job_id = %id, kind = %err.kind(), "Job failed: {}", err);
                registry.update(&id, |job| job.fail(&err))
            }
        };

        if let Err(err) = outcome {
            tracing::warn!(job_id = %id, "Could not record job outcome: {}", err);
        }
    }

    async fn execute(&self, runner: &StageRunner<'_>, input: &JobInput) -> Result<String, KaraokeError> {
        let job_dir = self.job_dir(&runner.job_id());

        let raw_audio = runner
            .run(Stage::Fetch, self.fetch(&input.source_url, &job_dir))
            .await?;

        let instrumental = runner
            .run(Stage::Separate, self.separate(runner, &raw_audio, &job_dir))
            .await?;

        let (timing, _lyrics) = runner
            .run(Stage::Lyrics, self.lyrics(&raw_audio, input.supplied_lyrics(), &job_dir))
            .await?;

        let video = runner
            .run(
                Stage::Render,
                self.render(&instrumental, &timing, input.title.as_deref(), &job_dir),
            )
            .await?;

        runner
            .run(
                Stage::Publish,
                self.tools.publisher.publish(runner.job_id(), &video.path),
            )
            .await
    }

    async fn fetch(&self, source: &str, job_dir: &Path) -> anyhow::Result<PipelineArtifact> {
        tokio::fs::create_dir_all(job_dir)
            .await
            .with_context(|| format!("Failed to create job directory {}", job_dir.display()))?;

        let fetched = self.tools.fetcher.fetch(source, job_dir).await?;

        let audio = if extractors::needs_transcode(&fetched) {
            tracing::debug!("Converting {} to mp3", fetched.display());
            self.tools
                .encoder
                .transcode_audio(&fetched, &job_dir.join(RAW_AUDIO_FILE))
                .await?
        } else {
            fetched
        };

        Ok(PipelineArtifact::new(ArtifactKind::RawAudio, audio))
    }

    async fn separate(
        &self,
        runner: &StageRunner<'_>,
        raw_audio: &PipelineArtifact,
        job_dir: &Path,
    ) -> anyhow::Result<PipelineArtifact> {
        if !self.tools.separator.is_available().await {
            if !self.allow_passthrough {
                anyhow::bail!("Vocal separation engine is not installed");
            }

            runner.note(PASSTHROUGH_NOTE);
            return Ok(PipelineArtifact::new(
                ArtifactKind::InstrumentalAudio,
                raw_audio.path.clone(),
            ));
        }

        let accompaniment = self
            .tools
            .separator
            .separate(&raw_audio.path, &job_dir.join(SEPARATED_DIR))
            .await?;

        let instrumental = self
            .tools
            .encoder
            .transcode_audio(&accompaniment, &job_dir.join(INSTRUMENTAL_FILE))
            .await?;

        Ok(PipelineArtifact::new(ArtifactKind::InstrumentalAudio, instrumental))
    }

    /// Transcription runs on the original audio, the instrumental has no vocals left to hear
    async fn lyrics(
        &self,
        raw_audio: &PipelineArtifact,
        supplied: Option<&str>,
        job_dir: &Path,
    ) -> anyhow::Result<(LyricsTiming, PipelineArtifact)> {
        let transcript = self.tools.transcriber.transcribe(&raw_audio.path, job_dir).await?;

        let timing = match supplied {
            Some(lyrics) => pair_supplied_lyrics(lyrics, transcript),
            None => transcript,
        };

        if timing.segments.is_empty() {
            tracing::warn!("No timed lyrics found, the video will have no captions");
        }

        let path = job_dir.join(LYRICS_FILE);
        let json = serde_json::to_string_pretty(&timing).context("Failed to serialize lyrics")?;
        fs_err::write(&path, json)?;

        Ok((timing, PipelineArtifact::new(ArtifactKind::LyricsTiming, path)))
    }

    async fn render(
        &self,
        instrumental: &PipelineArtifact,
        timing: &LyricsTiming,
        title: Option<&str>,
        job_dir: &Path,
    ) -> anyhow::Result<PipelineArtifact> {
        let captions = ass::build_captions(&timing.segments);
        let subtitle_path = job_dir.join(SUBTITLE_FILE);
        ass::write_ass(
            &subtitle_path,
            &captions,
            &self.render.subtitle,
            self.render.dimensions()?,
        )?;

        let duration_seconds = self.tools.encoder.probe_duration(&instrumental.path).await?;
        tracing::info!(
            captions = captions.len(),
            "Rendering {} of audio",
            format_duration(duration_seconds)
        );

        let composition = Composition {
            audio_path: instrumental.path.clone(),
            subtitle_path,
            output_path: job_dir.join(karaoke_filename(title)),
            duration_seconds,
        };
        let video = self.tools.encoder.compose_video(&composition).await?;

        Ok(PipelineArtifact::new(ArtifactKind::RenderedVideo, video))
    }
}

fn completion_message(notes: &[String]) -> String {
    if notes.is_empty() {
        COMPLETED_MESSAGE.to_string()
    } else {
        format!("{} Note: {}", COMPLETED_MESSAGE, notes.join("; "))
    }
}
