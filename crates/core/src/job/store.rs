//! Capture job storage trait.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{CaptureConfig, CaptureJob, CaptureJobEvent, EventType, JobStatus};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("capture job not found: {0}")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Trait for capture job storage backends.
///
/// Job records are created on submission and mutated only through
/// `update_status`; the event log is append-only. The core never deletes
/// job records.
pub trait JobStore: Send + Sync {
    /// Persist a new capture job with status `Submitted`.
    fn create(
        &self,
        created_by: &str,
        source_path: &str,
        capture_config: &CaptureConfig,
    ) -> Result<CaptureJob, JobStoreError>;

    /// Get a job by ID, without events.
    fn get(&self, id: i64) -> Result<Option<CaptureJob>, JobStoreError>;

    /// List jobs created between the two given dates (inclusive).
    fn list(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CaptureJob>, JobStoreError>;

    /// Update a job's status and optional status message.
    fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        message: Option<&str>,
    ) -> Result<CaptureJob, JobStoreError>;

    /// Append an event to a job's event log.
    fn append_event(
        &self,
        id: i64,
        event_type: EventType,
        details: &str,
    ) -> Result<(), JobStoreError>;

    /// All events for a job, in insertion order.
    fn events(&self, id: i64) -> Result<Vec<CaptureJobEvent>, JobStoreError>;
}
