use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::PublishConfig;
use crate::jobs::JobId;
use crate::Result;

/// Final stage destination for rendered videos
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the rendered video of a job and return where it can be found
    async fn publish(&self, job_id: JobId, video: &Path) -> Result<String>;
}

/// Keeps videos on the local filesystem.
///
/// Without an output directory the rendered file is reported where it is.
/// Otherwise it is copied to `<output_dir>/<job_id>/`, so jobs sharing a title
/// never overwrite each other. No upload to a video platform happens; users
/// upload manually.
pub struct LocalPublisher {
    output_dir: Option<PathBuf>,
}

impl LocalPublisher {
    pub fn new(config: &PublishConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
        }
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn publish(&self, job_id: JobId, video: &Path) -> Result<String> {
        let Some(output_dir) = &self.output_dir else {
            return Ok(video.to_string_lossy().into_owned());
        };

        let filename = video
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Rendered video has no file name: {}", video.display()))?;

        let job_dir = output_dir.join(job_id.to_string());
        tokio::fs::create_dir_all(&job_dir).await?;
        let target = job_dir.join(filename);
        tokio::fs::copy(video, &target).await?;

        tracing::info!(job_id = %job_id, "Published video to {}", target.display());
        Ok(target.to_string_lossy().into_owned())
    }
}
