//! Job executors - the backup and prune phases of a run.
//!
//! Both phases walk the configured jobs strictly in configuration order and
//! convert every per-job failure into an outcome instead of unwinding.

pub mod backup;
pub mod prune;
pub mod retention;

pub use backup::BackupRunner;
pub use prune::PruneRunner;

use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

/// Receives each job outcome as soon as it is known, so a phase that dies
/// midway still leaves its finished jobs behind
pub type OutcomeSender = mpsc::UnboundedSender<JobOutcome>;

/// Result of one job within one phase. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_name: String,
    pub succeeded: bool,
    /// Objects uploaded (0 or 1) or deleted by this job
    pub files_affected: u64,
    pub error_message: Option<String>,
}

impl JobOutcome {
    pub fn success(job_name: &str, files_affected: u64) -> Self {
        Self {
            job_name: job_name.to_string(),
            succeeded: true,
            files_affected,
            error_message: None,
        }
    }

    /// A skipped job: nothing done, nothing wrong
    pub fn skipped(job_name: &str) -> Self {
        Self::success(job_name, 0)
    }

    pub fn failure(job_name: &str, message: String) -> Self {
        Self {
            job_name: job_name.to_string(),
            succeeded: false,
            files_affected: 0,
            error_message: Some(message),
        }
    }
}

/// Aggregated outcomes of a phase, in job order
#[derive(Debug, Clone, Default)]
pub struct PhaseResult {
    pub outcomes: Vec<JobOutcome>,
}

impl PhaseResult {
    pub fn files_affected(&self) -> u64 {
        self.outcomes.iter().map(|o| o.files_affected).sum()
    }

    /// Append an outcome, forwarding a copy to the progress sink if any
    pub fn record(&mut self, outcome: JobOutcome, progress: Option<&OutcomeSender>) {
        if let Some(tx) = progress {
            if tx.send(outcome.clone()).is_err() {
                debug!(job = %outcome.job_name, "Outcome receiver closed");
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn errors(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error_message.clone())
            .collect()
    }
}

/// ISO-8601 UTC with millisecond precision, `:` and `.` replaced by `-`.
///
/// Fixed width and zero padded, so string order equals chronological order.
pub fn sortable_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// `{bucket}/{prefix}{basename}-{timestamp}.bak`
pub fn backup_object_key(
    bucket: &str,
    object_prefix: &str,
    source_path: &Path,
    at: DateTime<Utc>,
) -> String {
    let basename = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "{}/{}{}-{}.bak",
        bucket,
        object_prefix,
        basename,
        sortable_timestamp(at)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_backup_object_key_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap() + Duration::milliseconds(42);
        let key = backup_object_key("bucket", "db/", Path::new("/var/lib/app.sqlite"), at);
        assert_eq!(key, "bucket/db/app.sqlite-2024-03-09T07-05-01-042Z.bak");
    }

    #[test]
    fn test_keys_sort_chronologically() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 58).unwrap();
        let steps = [0, 1, 9, 10, 999, 1_000, 59_000, 3_600_000, 86_400_000];

        let keys: Vec<String> = steps
            .iter()
            .map(|ms| {
                backup_object_key("b", "p/", Path::new("f.txt"), start + Duration::milliseconds(*ms))
            })
            .collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys);
    }

    #[test]
    fn test_phase_result_aggregation() {
        let phase = PhaseResult {
            outcomes: vec![
                JobOutcome::success("a", 1),
                JobOutcome::failure("b", "boom".into()),
                JobOutcome::skipped("c"),
                JobOutcome::success("d", 3),
            ],
        };
        assert_eq!(phase.files_affected(), 4);
        assert_eq!(phase.errors(), vec!["boom"]);
    }

    #[test]
    fn test_record_forwards_to_progress() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut phase = PhaseResult::default();

        phase.record(JobOutcome::success("a", 1), Some(&tx));
        phase.record(JobOutcome::skipped("b"), None);
        assert_eq!(rx.try_recv().unwrap(), JobOutcome::success("a", 1));
        assert!(rx.try_recv().is_err());
        assert_eq!(phase.outcomes.len(), 2);

        drop(rx);
        phase.record(JobOutcome::success("c", 1), Some(&tx));
        assert_eq!(phase.files_affected(), 2);
    }
}
