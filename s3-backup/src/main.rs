//! S3 Backup - Main entry point
//!
//! Backs up the configured files, prunes old snapshots and writes a run report.

use anyhow::Result;
use clap::{Parser, Subcommand};
use s3_backup::report::ReportGenerator;
use s3_backup::store::{FsObjectStore, ObjectStore};
use s3_backup::{utils, Config, RunCoordinator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the backup process
    Backup {
        /// Path to the configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Command::Backup { config } => {
            // Load configuration
            let config = Config::load(config.as_deref())?;

            // Initialize logging
            let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
            utils::logger::init(log_level)?;
            utils::logger::install_panic_hook();

            tracing::info!(
                "Starting s3-backup v{} ({} jobs, bucket: {})",
                env!("CARGO_PKG_VERSION"),
                config.jobs.len(),
                config.s3.bucket
            );

            let store_root = config.store.root.clone();
            let reporter = ReportGenerator::new(&config.reporting);
            let mut coordinator = RunCoordinator::new(Arc::new(config), reporter);

            let summary = coordinator
                .run(move || {
                    let store = FsObjectStore::open(store_root)?;
                    Ok(Arc::new(store) as Arc<dyn ObjectStore>)
                })
                .await;

            if summary.report.is_success() {
                tracing::info!("Backup completed successfully");
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::error!(
                    errors = summary.report.errors.len(),
                    "Backup finished with errors"
                );
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
