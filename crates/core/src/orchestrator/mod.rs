//! Capture job orchestration.
//!
//! The orchestrator drives capture jobs through the stage pipeline:
//! - **IdentifyingMeasurements**: one script run over the source path
//! - **Gather stages**: well data, sub-well data and image data, one script
//!   run per measurement, unconfigured stages skipped
//!
//! Admission is gated by the active-job registry; progress is driven
//! entirely by inbound script execution updates.

mod config;
mod intake;
mod registry;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use intake::{spawn_update_consumer, JobIntake};
pub use registry::{ActiveJobRegistry, ActiveJobsObserver};
pub use runner::{CaptureOrchestrator, SYSTEM_USER};
pub use types::{ActiveJob, ActiveJobStage, OrchestratorError, StageContext};
