//! Prune phase - deletes snapshots beyond each job's retention count.

use super::retention::select_for_deletion;
use super::{OutcomeSender, JobOutcome, PhaseResult};
use crate::config::{Config, Job};
use crate::store::ObjectStore;
use crate::utils::errors::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Listing window requested from the store for one job
const LIST_LIMIT: usize = 10_000;

pub struct PruneRunner {
    config: Arc<Config>,
    store: Arc<dyn ObjectStore>,
    progress: Option<OutcomeSender>,
}

impl PruneRunner {
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

    /// Prune every configured job, one after the other.
    pub async fn run_all(&self) -> PhaseResult {
        info!("Starting prune run for {} jobs", self.config.jobs.len());
        let mut result = PhaseResult::default();

        for job in &self.config.jobs {
            let outcome = match self.run_job(job).await {
                Ok(deleted) => JobOutcome::success(&job.name, deleted),
                Err(e) => {
                    let message = format!("Failed to prune backups for job \"{}\": {}", job.name, e);
                    error!(job = %job.name, error = %e, "{}", message);
                    JobOutcome::failure(&job.name, message)
                }
            };
            result.record(outcome, self.progress.as_ref());
        }

        info!(
            deleted = result.files_affected(),
            errors = result.errors().len(),
            "Prune run finished"
        );
        result
    }

    /// Returns the number of confirmed deletions.
    ///
    /// Only a failed listing is an error. Individual delete failures are logged
    /// and leave the job successful with a lower count.
    async fn run_job(&self, job: &Job) -> Result<u64> {
        let retention_count = job.retention_count();
        if retention_count <= 0 {
            info!(
                job = %job.name,
                retention_count,
                "Skipping prune due to retention count policy"
            );
            return Ok(0);
        }

        info!(job = %job.name, "Pruning backups");
        let bucket = &self.config.s3.bucket;
        let list_prefix = format!("{}/{}", bucket, job.object_prefix);
        let all_backups = self.store.list(&list_prefix, 0, LIST_LIMIT, true).await?;

        let to_delete = select_for_deletion(&all_backups, retention_count);
        if to_delete.is_empty() {
            info!(
                job = %job.name,
                found = all_backups.len(),
                retention_count,
                "No old backups to prune"
            );
            return Ok(0);
        }

        info!(job = %job.name, count = to_delete.len(), "Found old backups to prune");

        let mut deleted = 0u64;
        for key in &to_delete {
            let delete_path = format!("{}/{}", bucket, key);
            info!(job = %job.name, key = %delete_path, "Deleting old backup");
            match self.store.delete(&delete_path).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(job = %job.name, key = %delete_path, error = %e, "Failed to delete backup");
                }
            }
        }

        Ok(deleted)
    }
}
