//! Run report generation.
//!
//! Every run ends here: the report is rendered to an HTML file and, when the
//! run recorded errors, an alert goes out to the configured recipients.

pub mod alert;

use crate::config::ReportingConfig;
use crate::coordinator::RunReport;
use crate::executor::sortable_timestamp;
use crate::utils::errors::{BackupError, Result};
use alert::{AlertTransport, JsonTransport};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

const ALERT_SUBJECT: &str = "Backup Job Failed";

/// Name collisions tolerated before giving up on a report file
const MAX_NAME_ATTEMPTS: usize = 100;

pub struct ReportGenerator {
    output_dir: PathBuf,
    recipients: Vec<String>,
    transport: Option<Arc<dyn AlertTransport>>,
}

impl ReportGenerator {
    /// Build a generator; an alert transport only exists when recipients are configured
    pub fn new(reporting: &ReportingConfig) -> Self {
        let transport = (!reporting.error_recipients.is_empty())
            .then(|| Arc::new(JsonTransport::new(&reporting.sender)) as Arc<dyn AlertTransport>);
        Self::build(reporting, transport)
    }

    pub fn with_transport(reporting: &ReportingConfig, transport: Arc<dyn AlertTransport>) -> Self {
        let transport = (!reporting.error_recipients.is_empty()).then_some(transport);
        Self::build(reporting, transport)
    }

    fn build(reporting: &ReportingConfig, transport: Option<Arc<dyn AlertTransport>>) -> Self {
        if transport.is_some() {
            info!(
                recipients = reporting.error_recipients.len(),
                "Alert transport created for error reporting"
            );
        }
        Self {
            output_dir: reporting.html_path.clone(),
            recipients: reporting.error_recipients.clone(),
            transport,
        }
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Persist the report and send the alert if needed.
    ///
    /// Failures are logged only; returns the report path when it was written.
    pub async fn generate(&self, report: &RunReport) -> Option<PathBuf> {
        info!("Generating reports");
        let html = render_html(report, &Utc::now().to_rfc2822());

        let saved = match save_report(&self.output_dir, &html).await {
            Ok(path) => {
                info!(path = %path.display(), "HTML report saved");
                Some(path)
            }
            Err(e) => {
                error!(dir = %self.output_dir.display(), error = %e, "Failed to save HTML report");
                None
            }
        };

        if !report.errors.is_empty() {
            if let Some(transport) = &self.transport {
                let body = render_alert_body(&report.errors);
                if let Err(e) = transport.deliver(&self.recipients, ALERT_SUBJECT, &body).await {
                    error!(error = %e, "Failed to send error report email");
                }
            }
        }

        saved
    }
}

pub fn render_html(report: &RunReport, generated_at: &str) -> String {
    let error_count = report.errors.len();
    let error_class = if error_count > 0 { "error" } else { "" };
    let generated_at = escape_html(generated_at);

    let mut html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Backup Report - {generated_at}</title>
  <style>
    body {{ font-family: sans-serif; }}
    .container {{ width: 80%; margin: auto; }}
    .error {{ color: red; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>Backup Report</h1>
    <p><strong>Report generated on:</strong> {generated_at}</p>
    <h2>Summary</h2>
    <ul>
      <li>Jobs Processed: {jobs}</li>
      <li>Files Uploaded: {uploaded}</li>
      <li>Files Deleted: {deleted}</li>
      <li>Errors: <span class="{error_class}">{error_count}</span></li>
    </ul>
"#,
        jobs = report.jobs_processed,
        uploaded = report.files_uploaded,
        deleted = report.files_deleted,
    );

    if error_count > 0 {
        html.push_str("    <h2>Errors</h2>\n    <ul>\n");
        for e in &report.errors {
            html.push_str(&format!("      <li class=\"error\">{}</li>\n", escape_html(e)));
        }
        html.push_str("    </ul>\n");
    }

    html.push_str("  </div>\n</body>\n</html>\n");
    html
}

fn render_alert_body(errors: &[String]) -> String {
    let mut body = String::from(
        "<h2>Backup Process Encountered Errors</h2>\n<p>The following errors were reported:</p>\n<ul>\n",
    );
    for e in errors {
        body.push_str(&format!("  <li>{}</li>\n", escape_html(e)));
    }
    body.push_str("</ul>\n");
    body
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Write `backup-<timestamp>.html`, appending `-N` when the name is taken
async fn save_report(dir: &Path, html: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let stem = format!("backup-{}", sortable_timestamp(Utc::now()));

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{}.html", stem)
        } else {
            format!("{}-{}.html", stem, attempt)
        };
        let path = dir.join(name);

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match file {
            Ok(mut file) => {
                file.write_all(html.as_bytes()).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(BackupError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free report name for {} in {}", stem, dir.display()),
    )))
}
