//! Capture job records and their storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobStore, JobStoreError};
pub use types::{
    CaptureConfig, CaptureJob, CaptureJobEvent, CaptureJobRequest, EventType, JobStatus,
    StageConfig,
};
