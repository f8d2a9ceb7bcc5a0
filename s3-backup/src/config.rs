//! Configuration management for the backup runner.
//!
//! Loads configuration from a JSON or TOML file. The result is validated once
//! and then shared read-only by every component of a run.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const DEFAULT_JSON_PATH: &str = "config/config.json";
const DEFAULT_TOML_PATH: &str = "config/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub s3: S3Config,

    #[serde(default)]
    pub store: StoreConfig,

    pub reporting: ReportingConfig,

    #[serde(default)]
    pub log: LogConfig,

    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket segment prepended to every object key
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory backing the filesystem object store
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingConfig {
    /// Directory receiving the HTML run reports
    pub html_path: PathBuf,

    /// Alert recipients, an empty list disables alerting
    #[serde(default)]
    pub error_recipients: Vec<String>,

    /// From header of alert messages
    #[serde(default = "default_sender")]
    pub sender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// One configured file-to-backup unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub name: String,

    /// File uploaded on every run
    #[serde(rename = "path")]
    pub source_path: PathBuf,

    /// Prefix inside the bucket, usually ending with `/`
    #[serde(rename = "s3KeyPrefix")]
    pub object_prefix: String,

    pub policy: JobPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPolicy {
    /// Number of most recent snapshots kept
    pub retention_count: i64,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Hourly,
    Daily,
    OnChangeOnly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::OnChangeOnly => "on-change-only",
        };
        f.write_str(s)
    }
}

impl Job {
    pub fn retention_count(&self) -> i64 {
        self.policy.retention_count
    }
}

// Default values
fn default_store_root() -> PathBuf {
    PathBuf::from("./store")
}

fn default_sender() -> String {
    "\"Secure S3 Backup\" <backup-noreply@example.com>".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Resolve, parse and validate the configuration.
    ///
    /// An explicit path wins; otherwise `config/config.json` and then
    /// `config/config.toml` are tried relative to the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = resolve_path(path)?;
        let config = Self::from_file(&resolved)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file, TOML when the extension says so and JSON otherwise
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config = if is_toml {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.s3.bucket.trim().is_empty() {
            return Err(BackupError::Config("s3.bucket must not be empty".into()));
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(BackupError::Config("job name must not be empty".into()));
            }
            if !names.insert(job.name.as_str()) {
                return Err(BackupError::Config(format!(
                    "duplicate job name \"{}\"",
                    job.name
                )));
            }
            if job.object_prefix.starts_with('/') || job.object_prefix.contains("//") {
                return Err(BackupError::Config(format!(
                    "job \"{}\": s3KeyPrefix must not start with '/' or contain '//', got \"{}\"",
                    job.name, job.object_prefix
                )));
            }
            if job.retention_count() <= 0 {
                return Err(BackupError::Config(format!(
                    "job \"{}\": retentionCount must be positive, got {}",
                    job.name,
                    job.retention_count()
                )));
            }
        }

        for recipient in &self.reporting.error_recipients {
            if !looks_like_email(recipient) {
                return Err(BackupError::Config(format!(
                    "invalid error recipient \"{}\"",
                    recipient
                )));
            }
        }

        Ok(())
    }
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }

    [DEFAULT_JSON_PATH, DEFAULT_TOML_PATH]
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
        .ok_or_else(|| BackupError::Config("configuration file not found".into()))
}

fn looks_like_email(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
