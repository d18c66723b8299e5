//! Orchestrator runtime types.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::job::{CaptureConfig, CaptureJob, StageConfig};
use crate::measurement::Measurement;

/// Errors that can occur during capture orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The active-job ceiling is reached.
    #[error("capture job refused: active job limit reached")]
    AdmissionRefused,

    /// Capture config referenced by id does not exist.
    #[error("capture config not found: {0}")]
    ConfigNotFound(i64),

    /// Stage script could not be resolved by name.
    #[error("capture script not found: {0}")]
    ScriptNotFound(String),

    /// Capture job not found.
    #[error("capture job not found: {0}")]
    JobNotFound(i64),

    /// Job is already in a terminal status.
    #[error("capture job cannot be cancelled in its current status")]
    NotCancellable,

    /// The capture config has no identifyMeasurements stage.
    #[error("capture config has no measurement identification stage")]
    MissingIdentifyStage,

    /// Invalid capture config payload.
    #[error("invalid capture config: {0}")]
    InvalidConfig(String),

    /// A script produced output the stage cannot use.
    #[error("malformed stage output: {0}")]
    MalformedStageOutput(String),

    /// Job store error.
    #[error("job store error: {0}")]
    JobStore(#[from] crate::job::JobStoreError),

    /// File store error.
    #[error("file store error: {0}")]
    FileStore(#[from] crate::filestore::FileStoreError),

    /// Script dispatch error.
    #[error("script dispatch error: {0}")]
    Bridge(#[from] crate::bridge::BridgeError),

    /// Downstream sink error.
    #[error("sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The pipeline stage an active job is currently in.
///
/// The gather stages run once per identified measurement; after
/// `CapturingImageData` the job loops back to `CapturingWellData` for the
/// next measurement, or completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveJobStage {
    IdentifyingMeasurements,
    CapturingWellData,
    CapturingSubWellData,
    CapturingImageData,
}

impl ActiveJobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveJobStage::IdentifyingMeasurements => "IdentifyingMeasurements",
            ActiveJobStage::CapturingWellData => "CapturingWellData",
            ActiveJobStage::CapturingSubWellData => "CapturingSubWellData",
            ActiveJobStage::CapturingImageData => "CapturingImageData",
        }
    }

    /// The stage definition in the capture config, if the stage is configured.
    pub fn stage_config<'a>(&self, config: &'a CaptureConfig) -> Option<&'a StageConfig> {
        match self {
            ActiveJobStage::IdentifyingMeasurements => config.identify_measurements.as_ref(),
            ActiveJobStage::CapturingWellData => config.gather_well_data.as_ref(),
            ActiveJobStage::CapturingSubWellData => config.gather_subwell_data.as_ref(),
            ActiveJobStage::CapturingImageData => config.gather_image_data.as_ref(),
        }
    }
}

impl std::fmt::Display for ActiveJobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory state for a job currently held by the registry.
pub struct ActiveJob {
    pub job: CaptureJob,
    pub stage: ActiveJobStage,
    pub measurements: Vec<Measurement>,
    pub current_measurement_index: usize,
    /// Correlation ids of script executions dispatched for this job and not
    /// yet answered.
    pub active_script_ids: HashSet<Uuid>,
}

impl ActiveJob {
    pub fn new(job: CaptureJob) -> Self {
        Self {
            job,
            stage: ActiveJobStage::IdentifyingMeasurements,
            measurements: Vec::new(),
            current_measurement_index: 0,
            active_script_ids: HashSet::new(),
        }
    }

    pub fn current_measurement(&self) -> Option<&Measurement> {
        self.measurements.get(self.current_measurement_index)
    }
}

/// Input handed to a capture script, JSON-encoded into the request.
///
/// `module_config` is the full stage definition (script id and parameters).
/// `source_path` is set for the identification run only; `measurement` for
/// the per-measurement gather runs only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageContext<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<&'a str>,
    pub module_config: &'a StageConfig,
    pub capture_job: &'a CaptureJob,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<&'a Measurement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use crate::testing::fixtures;
    use serde_json::json;

    fn sample_job() -> CaptureJob {
        CaptureJob {
            id: 7,
            create_date: chrono::Utc::now(),
            created_by: "System".to_string(),
            source_path: "/mnt/plates/run1".to_string(),
            capture_config: CaptureConfig::default(),
            status_code: JobStatus::Running,
            status_message: None,
            events: Vec::new(),
        }
    }

    #[test]
    fn test_stage_config_lookup() {
        let config = CaptureConfig {
            identify_measurements: Some(StageConfig::new("identify")),
            gather_subwell_data: Some(StageConfig::new("subwell")),
            ..Default::default()
        };

        assert!(ActiveJobStage::IdentifyingMeasurements
            .stage_config(&config)
            .is_some());
        assert!(ActiveJobStage::CapturingWellData
            .stage_config(&config)
            .is_none());
        assert_eq!(
            ActiveJobStage::CapturingSubWellData
                .stage_config(&config)
                .unwrap()
                .script_id,
            "subwell"
        );
    }

    #[test]
    fn test_identification_context_wire_shape() {
        let config = StageConfig::new("identify.hts");
        let job = sample_job();
        let context = StageContext {
            source_path: Some(&job.source_path),
            module_config: &config,
            capture_job: &job,
            measurement: None,
        };

        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(value["sourcePath"], "/mnt/plates/run1");
        assert_eq!(value["moduleConfig"]["scriptId"], "identify.hts");
        assert_eq!(value["captureJob"]["id"], 7);
        assert!(value.get("measurement").is_none());
    }

    #[test]
    fn test_gather_context_wire_shape() {
        let mut config = StageConfig::new("gather.welldata");
        config.params.insert("pattern".to_string(), json!("*.csv"));
        let job = sample_job();
        let measurement = fixtures::measurement("BC1");
        let context = StageContext {
            source_path: None,
            module_config: &config,
            capture_job: &job,
            measurement: Some(&measurement),
        };

        let value = serde_json::to_value(&context).unwrap();
        assert!(value.get("sourcePath").is_none());
        assert_eq!(value["moduleConfig"]["scriptId"], "gather.welldata");
        assert_eq!(value["moduleConfig"]["pattern"], "*.csv");
        assert_eq!(value["measurement"]["barcode"], "BC1");
    }
}
