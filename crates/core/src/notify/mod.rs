//! Job-updated notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::job::JobStatus;

/// Emitted on every job status change and on each completed measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdatedNotification {
    pub job_id: i64,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
}

/// Broadcast fan-out of job update notifications.
///
/// Notification is fire-and-forget: having no subscribers is not an error,
/// and emission never blocks or fails the orchestrator.
#[derive(Clone)]
pub struct JobNotifier {
    tx: broadcast::Sender<JobUpdatedNotification>,
}

impl JobNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdatedNotification> {
        self.tx.subscribe()
    }

    pub fn notify(&self, notification: JobUpdatedNotification) {
        trace!(job_id = notification.job_id, status = %notification.status, "Job update notification");
        let _ = self.tx.send(notification);
    }
}

impl Default for JobNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}
