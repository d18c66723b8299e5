//! Sink traits for registering captured data downstream.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::measurement::Measurement;

/// Error type for sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Registers measurements with the measurement service.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    /// Register a new measurement; returns the durable id assigned downstream.
    async fn create_measurement(&self, measurement: &Measurement) -> Result<i64, SinkError>;

    /// Push the current state of an already registered measurement.
    async fn update_measurement(&self, measurement: &Measurement) -> Result<(), SinkError>;

    /// Remove a registered measurement. Used by the abort rollback path.
    async fn delete_measurement(&self, id: i64) -> Result<(), SinkError>;
}

/// Attaches properties and tags to registered measurements.
#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn post_property(
        &self,
        measurement_id: i64,
        name: &str,
        value: &Value,
    ) -> Result<(), SinkError>;

    async fn post_tag(&self, measurement_id: i64, tag: &str) -> Result<(), SinkError>;
}
