use std::future::Future;
use std::time::Instant;

use super::Stage;
use crate::jobs::{JobId, JobRegistry};
use crate::KaraokeError;

/// Runs the stages of a single job and reports each transition to the registry
pub struct StageRunner<'a> {
    registry: &'a JobRegistry,
    job_id: JobId,
}

impl<'a> StageRunner<'a> {
    pub fn new(registry: &'a JobRegistry, job_id: JobId) -> Self {
        Self { registry, job_id }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Enter `stage`, then drive `work` to completion.
    ///
    /// Errors from `work` come back wrapped in the stage's [`KaraokeError`]
    /// variant with the original error as the source.
    pub async fn run<T, F>(&self, stage: Stage, work: F) -> Result<T, KaraokeError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.registry.update(&self.job_id, |job| job.enter_stage(stage))?;
        tracing::info!(
            job_id = %self.job_id,
            stage = %stage,
            progress = stage.checkpoint(),
            "{}",
            stage.message()
        );

        let started = Instant::now();
        match work.await {
            Ok(value) => {
                tracing::debug!(
                    job_id = %self.job_id,
                    stage = %stage,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stage finished"
                );
                Ok(value)
            }
            Err(error) => {
                tracing::error!(
                    job_id = %self.job_id,
                    stage = %stage,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stage failed: {:#}",
                    error
                );
                Err(stage.wrap_error(error))
            }
        }
    }

    /// Record a degraded-mode warning on the job
    pub fn note(&self, note: &str) {
        tracing::warn!(job_id = %self.job_id, "{}", note);
        if let Err(err) = self.registry.update(&self.job_id, |job| job.add_note(note)) {
            tracing::warn!(job_id = %self.job_id, "Could not record note: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobInput, JobStatus};
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_stage_enters_checkpoint_before_work_runs() {
        let registry = JobRegistry::new();
        let id = registry.create(JobInput::new("https://example.com/v"));
        let runner = StageRunner::new(&registry, id);

        let seen = runner
            .run(Stage::Lyrics, async { Ok(registry.get(&id).unwrap().progress) })
            .await
            .unwrap();

        assert_eq!(seen, 50);
        assert_eq!(registry.get(&id).unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_failure_is_wrapped_in_stage_error() {
        let registry = JobRegistry::new();
        let id = registry.create(JobInput::new("https://example.com/v"));
        let runner = StageRunner::new(&registry, id);

        let err = runner
            .run::<(), _>(Stage::Render, async { Err(anyhow::anyhow!("ffmpeg exited with 1")) })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Render);
        assert_eq!(err.to_string(), "Failed to render video: ffmpeg exited with 1");
    }

    #[tokio::test]
    async fn test_note_survives_later_messages() {
        let registry = JobRegistry::new();
        let id = registry.create(JobInput::new("https://example.com/v"));
        let runner = StageRunner::new(&registry, id);

        runner.note("Vocals kept");
        runner.run(Stage::Lyrics, async { Ok(()) }).await.unwrap();

        let view = registry.get(&id).unwrap();
        assert_eq!(view.message, Stage::Lyrics.message());
        assert_eq!(view.notes, vec!["Vocals kept".to_string()]);
    }
}
