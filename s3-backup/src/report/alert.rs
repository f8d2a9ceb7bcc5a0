//! Alert capability used to notify recipients about failed runs.

use crate::utils::errors::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Deliver one message to every recipient
    async fn deliver(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

/// Serialized form of an alert, as handed to a mail relay
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMessage {
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Renders alerts to JSON and logs them instead of talking to an SMTP relay.
pub struct JsonTransport {
    sender: String,
}

impl JsonTransport {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    pub fn build_message(&self, recipients: &[String], subject: &str, body: &str) -> AlertMessage {
        AlertMessage {
            message_id: format!("<{}@s3-backup>", Uuid::new_v4()),
            from: self.sender.clone(),
            to: recipients.join(","),
            subject: subject.to_string(),
            html: body.to_string(),
        }
    }
}

#[async_trait]
impl AlertTransport for JsonTransport {
    async fn deliver(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(recipients, subject, body);
        let json = serde_json::to_string(&message)?;

        info!(message_id = %message.message_id, to = %message.to, "Error report email sent");
        debug!(email = %json, "Email content");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use crate::utils::errors::BackupError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedAlert {
        pub recipients: Vec<String>,
        pub subject: String,
        pub body: String,
    }

    /// Test double that records deliveries, optionally failing each one
    #[derive(Default)]
    pub struct RecordingTransport {
        pub calls: Mutex<Vec<RecordedAlert>>,
        pub fail: bool,
    }

    impl RecordingTransport {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<RecordedAlert> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertTransport for RecordingTransport {
        async fn deliver(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
            self.calls.lock().unwrap().push(RecordedAlert {
                recipients: recipients.to_vec(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            if self.fail {
                return Err(BackupError::Alert("relay refused connection".into()));
            }
            Ok(())
        }
    }
}
