//! Backup phase - uploads one timestamped snapshot per job.

use super::{OutcomeSender, backup_object_key, JobOutcome, PhaseResult};
use crate::config::{Config, Job};
use crate::store::ObjectStore;
use crate::utils::errors::Result;
use bytes::Bytes;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct BackupRunner {
    config: Arc<Config>,
    store: Arc<dyn ObjectStore>,
    progress: Option<OutcomeSender>,
}

impl BackupRunner {
    pub fn new(config: Arc<Config>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store,
            progress: None,
        }
    }

    /// Forward every job outcome to `progress` as it completes
    pub fn with_progress(mut self, progress: OutcomeSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Back up every configured job, one after the other.
    ///
    /// A failing job is recorded in its outcome and the next job still runs.
    pub async fn run_all(&self) -> PhaseResult {
        info!("Starting backup run for {} jobs", self.config.jobs.len());
        let mut result = PhaseResult::default();

        for job in &self.config.jobs {
            let outcome = match self.run_job(job).await {
                Ok(true) => JobOutcome::success(&job.name, 1),
                Ok(false) => JobOutcome::skipped(&job.name),
                Err(e) => {
                    let message = format!("Failed to run job \"{}\": {}", job.name, e);
                    error!(job = %job.name, error = %e, "{}", message);
                    JobOutcome::failure(&job.name, message)
                }
            };
            result.record(outcome, self.progress.as_ref());
        }

        info!(
            uploaded = result.files_affected(),
            errors = result.errors().len(),
            "Backup run finished"
        );
        result
    }

    /// Returns false when the job was skipped because its source is missing
    async fn run_job(&self, job: &Job) -> Result<bool> {
        info!(job = %job.name, frequency = %job.policy.frequency, "Running backup job");

        let Some(data) = read_source(&job.source_path).await? else {
            warn!(
                job = %job.name,
                path = %job.source_path.display(),
                "Skipping job because the source file was not found"
            );
            return Ok(false);
        };

        let key = backup_object_key(
            &self.config.s3.bucket,
            &job.object_prefix,
            &job.source_path,
            Utc::now(),
        );

        info!(job = %job.name, key = %key, bytes = data.len(), "Uploading backup");
        self.store.put(&key, data).await?;
        info!(job = %job.name, "Successfully uploaded backup");
        Ok(true)
    }
}

/// Read a source file, `None` when it does not exist
async fn read_source(path: &Path) -> Result<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(content) => Ok(Some(Bytes::from(content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
