use dashmap::DashMap;
use std::sync::Arc;

use super::{Job, JobId, JobInput, JobView};
use crate::KaraokeError;

/// Process-wide store of job state.
///
/// Cheap to clone; every clone shares the same map. Any number of readers may
/// poll concurrently while each job has a single writer: the pipeline task that
/// owns it. Writes are visible to readers immediately.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new pending job and return its id
    pub fn create(&self, input: JobInput) -> JobId {
        let id = JobId::new();
        self.jobs.insert(id, Job::new(id, input));

        tracing::debug!(job_id = %id, "Job registered");
        id
    }

    /// Snapshot of a job's current state
    pub fn get(&self, id: &JobId) -> Result<JobView, KaraokeError> {
        self.jobs
            .get(id)
            .map(|job| job.view())
            .ok_or(KaraokeError::NotFound(*id))
    }

    /// Apply a mutation to a job; terminal jobs are left untouched
    pub fn update<F>(&self, id: &JobId, mutation: F) -> Result<(), KaraokeError>
    where
        F: FnOnce(&mut Job),
    {
        let mut job = self.jobs.get_mut(id).ok_or(KaraokeError::NotFound(*id))?;

        if job.is_terminal() {
            tracing::warn!(job_id = %id, status = %job.status, "Ignoring update to finished job");
            return Ok(());
        }

        mutation(job.value_mut());
        Ok(())
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self.jobs.iter().map(|entry| entry.view()).collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
