use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RecruiterConfig;
use crate::error::SessionResult;
use crate::persist::{save_result, InterviewRecord, SaveStatus, WebhookArchive};
use crate::session::{InterviewResult, SessionConfig, SessionControl, SessionHandle, SessionLauncher};

/// Final outcome of an interview and when it was produced
#[derive(Debug, Clone)]
pub struct Completed {
    pub outcome: SessionResult<InterviewResult>,
    pub at: DateTime<Local>,
}

/// A started interview
pub struct InterviewEntry {
    pub config: SessionConfig,
    pub control: SessionControl,
    pub completed: watch::Receiver<Option<Completed>>,
    pub saved: watch::Receiver<SaveStatus>,
}

impl InterviewEntry {
    pub fn completed(&self) -> Option<Completed> {
        self.completed.borrow().clone()
    }

    pub fn save_status(&self) -> SaveStatus {
        *self.saved.borrow()
    }
}

/// How long a finished interview stays queryable
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub launcher: SessionLauncher,
    pub archive: Option<WebhookArchive>,
    pub recruiter: RecruiterConfig,
    /// Interviews by id, running or finished within `retention`
    pub interviews: Arc<RwLock<HashMap<Uuid, Arc<InterviewEntry>>>>,
    pub retention: Duration,
}

impl AppState {
    pub fn new(launcher: SessionLauncher, archive: Option<WebhookArchive>) -> Self {
        let recruiter = launcher.settings().recruiter.clone();
        Self {
            launcher,
            archive,
            recruiter,
            interviews: Arc::new(RwLock::new(HashMap::new())),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Register a launched session under `id`: collect its outcome, submit the
    /// record, then forget the interview once `retention` has passed
    pub async fn track(
        &self,
        id: Uuid,
        config: SessionConfig,
        handle: SessionHandle,
    ) -> Arc<InterviewEntry> {
        let (completed_tx, completed_rx) = watch::channel(None);
        let (saved_tx, saved_rx) = watch::channel(SaveStatus::Idle);

        let entry = Arc::new(InterviewEntry {
            config: config.clone(),
            control: handle.control(),
            completed: completed_rx,
            saved: saved_rx,
        });
        self.interviews.write().await.insert(id, Arc::clone(&entry));

        let archive = self.archive.clone();
        let interviews = Arc::clone(&self.interviews);
        let retention = self.retention;
        tokio::spawn(async move {
            let outcome = handle.finished().await;
            let at = Local::now();

            let record = match &outcome {
                Ok(result) => Some(InterviewRecord::new(&config, result, at)),
                Err(e) => {
                    warn!("Interview for {} ended without a result: {}", config.candidate_name, e);
                    None
                }
            };
            completed_tx.send_replace(Some(Completed { outcome, at }));

            if let Some(record) = record {
                save_result(archive.as_ref(), &record, &saved_tx).await;
            }

            tokio::time::sleep(retention).await;
            interviews.write().await.remove(&id);
            debug!("Interview {} evicted", id);
        });

        entry
    }
}
