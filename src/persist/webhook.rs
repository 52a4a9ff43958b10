use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use super::record::InterviewRecord;
use crate::config::PersistenceConfig;

/// Progress of the best-effort result upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Saving,
    Success,
    Error,
}

/// Posts interview records to an external webhook
#[derive(Debug, Clone)]
pub struct WebhookArchive {
    client: reqwest::Client,
    url: String,
}

impl WebhookArchive {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
        }
    }

    /// `None` when no webhook is configured
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        let url = config.webhook_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self::new(url))
    }

    pub async fn submit(&self, record: &InterviewRecord) -> Result<()> {
        self.client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .context("Failed to reach result webhook")?
            .error_for_status()
            .context("Result webhook rejected the record")?;

        info!("Saved interview record for {}", record.name);
        Ok(())
    }
}

/// Submit once, reporting progress on `status`. Never retried; without an
/// archive the status stays idle.
pub async fn save_result(
    archive: Option<&WebhookArchive>,
    record: &InterviewRecord,
    status: &watch::Sender<SaveStatus>,
) -> SaveStatus {
    let Some(archive) = archive else {
        return *status.borrow();
    };

    status.send_replace(SaveStatus::Saving);
    let outcome = match archive.submit(record).await {
        Ok(()) => SaveStatus::Success,
        Err(e) => {
            error!("Failed to save interview record: {:#}", e);
            SaveStatus::Error
        }
    };
    status.send_replace(outcome);
    outcome
}
