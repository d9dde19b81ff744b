use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{JobId, JobInput, JobRegistry, JobView};
use crate::config::AppConfig;
use crate::pipeline::KaraokePipeline;
use crate::KaraokeError;

const QUEUED_MESSAGE: &str = "Queued, waiting for a free worker";

/// Accepts karaoke requests and runs them in the background.
///
/// At most `max_concurrent_jobs` pipelines run at once; further jobs wait as
/// pending. Once `max_queued_jobs` jobs are unfinished, new submissions are
/// rejected with [`KaraokeError::QueueFull`].
pub struct Orchestrator {
    registry: JobRegistry,
    pipeline: Arc<KaraokePipeline>,
    workers: Arc<Semaphore>,
    queue: Arc<Semaphore>,
    max_queued_jobs: usize,
    poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(registry: JobRegistry, pipeline: Arc<KaraokePipeline>, config: &AppConfig) -> Self {
        let max_concurrent_jobs = config.max_concurrent_jobs.max(1);
        let max_queued_jobs = config.max_queued_jobs.max(max_concurrent_jobs);

        Self {
            registry,
            pipeline,
            workers: Arc::new(Semaphore::new(max_concurrent_jobs)),
            queue: Arc::new(Semaphore::new(max_queued_jobs)),
            max_queued_jobs,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(10)),
        }
    }

    /// Register a job and start it in the background.
    ///
    /// Returns as soon as the job is registered; the pipeline runs on its own
    /// task whether or not the caller keeps polling. Must be called from within
    /// a tokio runtime.
    pub fn submit(&self, input: JobInput) -> Result<JobId, KaraokeError> {
        if input.source_url.trim().is_empty() {
            return Err(KaraokeError::InvalidRequest("source_url must not be empty".to_string()));
        }

        let queue_slot = self
            .queue
            .clone()
            .try_acquire_owned()
            .map_err(|_| KaraokeError::QueueFull(self.max_queued_jobs))?;

        let id = self.registry.create(input.clone());
        self.registry.update(&id, |job| job.set_pending_message(QUEUED_MESSAGE))?;
        tracing::info!(job_id = %id, source = %input.source_url, "Job submitted");

        let registry = self.registry.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let workers = Arc::clone(&self.workers);

        tokio::spawn(async move {
            let _queue_slot = queue_slot;

            let _worker = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let err = KaraokeError::Aborted("worker pool closed".to_string());
                    if let Err(update_error) = registry.update(&id, |job| job.fail(&err)) {
                        tracing::warn!(job_id = %id, "Could not record abort: {}", update_error);
                    }
                    return;
                }
            };
            tracing::debug!(job_id = %id, "Worker acquired");

            // Run on a separate task so a panic still leaves the job in a terminal state
            let task_registry = registry.clone();
            let execution = tokio::spawn(async move {
                pipeline.run(&task_registry, id, &input).await;
            });

            if let Err(join_error) = execution.await {
                tracing::error!(job_id = %id, "Pipeline task aborted: {}", join_error);
                let err = KaraokeError::Aborted(join_error.to_string());
                if let Err(update_error) = registry.update(&id, |job| job.fail(&err)) {
                    tracing::warn!(job_id = %id, "Could not record abort: {}", update_error);
                }
            }
        });

        Ok(id)
    }

    /// Current state of a job
    pub fn status(&self, id: &JobId) -> Result<JobView, KaraokeError> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Poll a job until it completes or fails
    pub async fn wait(&self, id: &JobId) -> Result<JobView, KaraokeError> {
        loop {
            let view = self.status(id)?;
            if view.is_terminal() {
                return Ok(view);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extractors::AudioFetcher;
    use crate::jobs::JobStatus;
    use crate::media::MockMediaEncoder;
    use crate::pipeline::Toolchain;
    use crate::publish::MockPublisher;
    use crate::separation::MockVocalSeparator;
    use crate::transcribe::MockTranscriber;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    /// Fetcher that blocks until the test hands out permits, then fails
    struct GatedFetcher {
        gate: Semaphore,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl GatedFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AudioFetcher for GatedFetcher {
        async fn fetch(&self, _source: &str, _work_dir: &Path) -> crate::Result<PathBuf> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            let permit = self.gate.acquire().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Ok(permit) = permit {
                permit.forget();
            }

            Err(anyhow::anyhow!("source offline"))
        }
    }

    fn orchestrator(fetcher: Arc<GatedFetcher>, app: AppConfig) -> (Orchestrator, tempfile::TempDir) {
        let work = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.app = app;
        config.app.work_dir = Some(work.path().to_path_buf());

        // Every job fails at fetch, nothing else may be touched
        let tools = Toolchain {
            fetcher,
            separator: Arc::new(MockVocalSeparator::new()),
            transcriber: Arc::new(MockTranscriber::new()),
            encoder: Arc::new(MockMediaEncoder::new()),
            publisher: Arc::new(MockPublisher::new()),
        };
        let pipeline = Arc::new(KaraokePipeline::new(tools, &config));

        (Orchestrator::new(JobRegistry::new(), pipeline, &config.app), work)
    }

    fn app(max_concurrent_jobs: usize, max_queued_jobs: usize) -> AppConfig {
        AppConfig {
            work_dir: None,
            max_concurrent_jobs,
            max_queued_jobs,
            poll_interval_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_submit_returns_before_pipeline_finishes() {
        let fetcher = GatedFetcher::new();
        let (orchestrator, _work) = orchestrator(fetcher.clone(), app(1, 4));

        let started = Instant::now();
        let id = assert_ok!(orchestrator.submit(JobInput::new("https://example.com/v")));
        assert!(started.elapsed() < Duration::from_secs(1));

        let view = orchestrator.status(&id).unwrap();
        assert!(!view.is_terminal());
        assert!(view.progress <= 10);

        fetcher.gate.add_permits(1);
        let done = orchestrator.wait(&id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.progress, 10);
        assert_eq!(done.error_kind, Some(ErrorKind::Fetch));
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let fetcher = GatedFetcher::new();
        let (orchestrator, _work) = orchestrator(fetcher.clone(), app(2, 8));

        let ids: Vec<JobId> = (0..5)
            .map(|i| orchestrator.submit(JobInput::new(format!("https://example.com/{}", i))).unwrap())
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let pending = ids
            .iter()
            .filter(|id| orchestrator.status(id).unwrap().status == JobStatus::Pending)
            .count();
        assert_eq!(pending, 3);
        assert_eq!(
            orchestrator.status(&ids[4]).unwrap().message,
            QUEUED_MESSAGE
        );

        fetcher.gate.add_permits(ids.len());
        for id in &ids {
            let view = orchestrator.wait(id).await.unwrap();
            assert_eq!(view.status, JobStatus::Failed);
        }
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_queue_full_rejects_submission() {
        let fetcher = GatedFetcher::new();
        let (orchestrator, _work) = orchestrator(fetcher.clone(), app(1, 1));

        let first = assert_ok!(orchestrator.submit(JobInput::new("https://example.com/a")));
        let err = assert_err!(orchestrator.submit(JobInput::new("https://example.com/b")));
        assert!(matches!(err, KaraokeError::QueueFull(1)));
        assert_eq!(orchestrator.registry().len(), 1);

        fetcher.gate.add_permits(1);
        orchestrator.wait(&first).await.unwrap();

        // The slot is released once the job has finished
        let mut accepted = None;
        for _ in 0..50 {
            if let Ok(id) = orchestrator.submit(JobInput::new("https://example.com/c")) {
                accepted = Some(id);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(accepted.is_some());
        fetcher.gate.add_permits(1);
    }

    #[tokio::test]
    async fn test_closed_worker_pool_fails_waiting_jobs() {
        let fetcher = GatedFetcher::new();
        let (orchestrator, _work) = orchestrator(fetcher.clone(), app(1, 4));

        let running = orchestrator.submit(JobInput::new("https://example.com/a")).unwrap();
        let waiting = orchestrator.submit(JobInput::new("https://example.com/b")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        orchestrator.workers.close();
        let aborted = orchestrator.wait(&waiting).await.unwrap();
        assert_eq!(aborted.status, JobStatus::Failed);
        assert_eq!(aborted.error_kind, Some(ErrorKind::Aborted));
        assert_eq!(aborted.progress, 0);

        // A job that already holds a worker runs to its own end
        fetcher.gate.add_permits(1);
        let finished = orchestrator.wait(&running).await.unwrap();
        assert_eq!(finished.error_kind, Some(ErrorKind::Fetch));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (orchestrator, _work) = orchestrator(GatedFetcher::new(), app(1, 1));
        let unknown = JobId::new();

        let err = assert_err!(orchestrator.status(&unknown));
        assert!(matches!(err, KaraokeError::NotFound(id) if id == unknown));
        assert!(orchestrator.wait(&unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let (orchestrator, _work) = orchestrator(GatedFetcher::new(), app(1, 1));

        let err = assert_err!(orchestrator.submit(JobInput::new("   ")));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(orchestrator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_reads_are_stable() {
        let fetcher = GatedFetcher::new();
        let (orchestrator, _work) = orchestrator(fetcher.clone(), app(1, 2));
        fetcher.gate.add_permits(1);

        let id = orchestrator.submit(JobInput::new("https://example.com/v")).unwrap();
        let first = orchestrator.wait(&id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = orchestrator.status(&id).unwrap();

        assert_eq!(first, second);
    }
}
