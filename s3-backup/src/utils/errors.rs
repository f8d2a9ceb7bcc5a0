//! Custom error types for the backup runner.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Alert delivery error: {0}")]
    Alert(String),

    #[error("{0}")]
    Critical(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;
