//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external service traits,
//! allowing comprehensive E2E testing without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use platecap_core::testing::{MockScriptDispatcher, MockMeasurementSink, MockMetadataSink};
//!
//! let dispatcher = Arc::new(MockScriptDispatcher::new());
//! let measurement_sink = Arc::new(MockMeasurementSink::new());
//! let metadata_sink = Arc::new(MockMetadataSink::new());
//!
//! // Drive the orchestrator, then assert on recorded calls:
//! let requests = dispatcher.requests().await;
//! let deleted = measurement_sink.deleted().await;
//! ```

mod mock_dispatcher;
mod mock_measurement_sink;
mod mock_metadata_sink;

pub use mock_dispatcher::MockScriptDispatcher;
pub use mock_measurement_sink::MockMeasurementSink;
pub use mock_metadata_sink::{MockMetadataSink, RecordedProperty};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::bridge::{ScriptExecutionUpdate, ScriptStatus};
    use crate::job::{CaptureConfig, StageConfig};
    use crate::measurement::Measurement;
    use uuid::Uuid;

    /// A capture config with all four stages configured.
    pub fn full_capture_config() -> CaptureConfig {
        CaptureConfig {
            name: Some("full-capture".to_string()),
            identify_measurements: Some(StageConfig::new("identify.measurements")),
            gather_well_data: Some(StageConfig::new("gather.welldata")),
            gather_subwell_data: Some(StageConfig::new("gather.subwelldata")),
            gather_image_data: Some(StageConfig::new("gather.imagedata")),
        }
    }

    /// A capture config with identification only; all gather stages skip.
    pub fn identify_only_config() -> CaptureConfig {
        CaptureConfig {
            name: Some("identify-only".to_string()),
            identify_measurements: Some(StageConfig::new("identify.measurements")),
            ..Default::default()
        }
    }

    /// A test measurement with reasonable defaults.
    pub fn measurement(barcode: &str) -> Measurement {
        Measurement {
            name: format!("plate-{barcode}"),
            barcode: barcode.to_string(),
            rows: 16,
            columns: 24,
            ..Default::default()
        }
    }

    /// A successful script update carrying the given output value.
    pub fn ok_update(input_id: Uuid, output: serde_json::Value) -> ScriptExecutionUpdate {
        ScriptExecutionUpdate {
            input_id,
            status_code: ScriptStatus::Ok,
            status_message: None,
            output: Some(output),
        }
    }

    /// A script update reporting failure.
    pub fn error_update(input_id: Uuid, message: &str) -> ScriptExecutionUpdate {
        ScriptExecutionUpdate {
            input_id,
            status_code: ScriptStatus::ScriptError,
            status_message: Some(message.to_string()),
            output: None,
        }
    }
}
