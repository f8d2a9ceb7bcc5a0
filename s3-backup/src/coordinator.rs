//! Run coordination: backup, then prune, then report.
//!
//! The coordinator owns the run report. Whatever happens in the backup and
//! prune phases, the report is generated exactly once before the run ends.

use crate::config::Config;
use crate::executor::{BackupRunner, OutcomeSender, PhaseResult, PruneRunner};
use crate::report::ReportGenerator;
use crate::store::ObjectStore;
use crate::utils::errors::{BackupError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Aggregated outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Configured job count, successful or not
    pub jobs_processed: usize,
    pub files_uploaded: u64,
    pub files_deleted: u64,
    /// Backup errors, then prune errors, then a critical error if any
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    BackingUp,
    Pruning,
    Reporting,
    Done,
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    /// Where the HTML report landed, `None` if it could not be written
    pub report_path: Option<PathBuf>,
}

pub struct RunCoordinator {
    config: Arc<Config>,
    reporter: ReportGenerator,
    phase: RunPhase,
}

impl RunCoordinator {
    pub fn new(config: Arc<Config>, reporter: ReportGenerator) -> Self {
        Self {
            config,
            reporter,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Execute one run.
    ///
    /// `connect` builds the store handle shared by every job. If it fails, or a
    /// phase dies, the remaining phases are skipped and a `Critical:` entry is
    /// added before reporting.
    pub async fn run<F>(&mut self, connect: F) -> RunSummary
    where
        F: FnOnce() -> Result<Arc<dyn ObjectStore>>,
    {
        let mut report = RunReport {
            jobs_processed: self.config.jobs.len(),
            ..RunReport::default()
        };

        if let Err(e) = self.run_phases(connect, &mut report).await {
            error!(error = %e, "Run aborted before completion");
            report.errors.push(format!("Critical: {}", e));
        }

        self.advance(RunPhase::Reporting);
        let report_path = self.reporter.generate(&report).await;
        self.advance(RunPhase::Done);

        info!(
            jobs = report.jobs_processed,
            uploaded = report.files_uploaded,
            deleted = report.files_deleted,
            errors = report.errors.len(),
            "Run finished"
        );

        RunSummary {
            report,
            report_path,
        }
    }

    async fn run_phases<F>(&mut self, connect: F, report: &mut RunReport) -> Result<()>
    where
        F: FnOnce() -> Result<Arc<dyn ObjectStore>>,
    {
        let store = connect()?;

        self.advance(RunPhase::BackingUp);
        let config = Arc::clone(&self.config);
        let backup_store = Arc::clone(&store);
        let (uploaded, outcome) = run_isolated("backup", move |progress| async move {
            BackupRunner::new(config, backup_store)
                .with_progress(progress)
                .run_all()
                .await
        })
        .await;
        report.files_uploaded = uploaded.files_affected();
        report.errors.extend(uploaded.errors());
        outcome?;

        self.advance(RunPhase::Pruning);
        let config = Arc::clone(&self.config);
        let (pruned, outcome) = run_isolated("prune", move |progress| async move {
            PruneRunner::new(config, store)
                .with_progress(progress)
                .run_all()
                .await
        })
        .await;
        report.files_deleted = pruned.files_affected();
        report.errors.extend(pruned.errors());
        outcome
    }

    fn advance(&mut self, next: RunPhase) {
        info!(from = ?self.phase, to = ?next, "Run phase transition");
        self.phase = next;
    }
}

/// Run a phase on its own task so a panic surfaces as an error instead of
/// tearing down the run before reporting.
///
/// The phase reports each finished job through the sender it is given. If the
/// task dies, the jobs it already finished are still returned alongside the
/// error.
async fn run_isolated<F, Fut>(name: &str, phase: F) -> (PhaseResult, Result<()>)
where
    F: FnOnce(OutcomeSender) -> Fut,
    Fut: std::future::Future<Output = PhaseResult> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    match tokio::spawn(phase(tx)).await {
        Ok(result) => (result, Ok(())),
        Err(e) => {
            let mut partial = PhaseResult::default();
            while let Ok(outcome) = rx.try_recv() {
                partial.outcomes.push(outcome);
            }
            warn!(
                phase = name,
                finished_jobs = partial.outcomes.len(),
                "Phase aborted, keeping finished jobs"
            );
            let err = BackupError::Critical(format!("{} phase aborted: {}", name, e));
            (partial, Err(err))
        }
    }
}
