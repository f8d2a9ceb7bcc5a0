//! S3 Backup Library
//!
//! Uploads timestamped snapshots of configured files to an object store,
//! prunes old snapshots per job and reports the outcome of each run.

pub mod config;
pub mod coordinator;
pub mod executor;
pub mod report;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{RunCoordinator, RunReport};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
