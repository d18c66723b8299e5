//! Mock measurement sink for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::measurement::Measurement;
use crate::sink::{MeasurementSink, SinkError};

/// Mock implementation of the MeasurementSink trait.
///
/// Assigns sequential ids on creation and records every call:
/// - `created()` / `updated()` for the registered payloads
/// - `deleted()` for rollback assertions
/// - `fail_deletes` simulates a downstream that refuses deletion, to test
///   that rollback keeps going
#[derive(Debug)]
pub struct MockMeasurementSink {
    created: Arc<RwLock<Vec<Measurement>>>,
    updated: Arc<RwLock<Vec<Measurement>>>,
    deleted: Arc<RwLock<Vec<i64>>>,
    next_id: AtomicI64,
    fail_creates: Arc<RwLock<bool>>,
    fail_deletes: Arc<RwLock<bool>>,
}

impl Default for MockMeasurementSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMeasurementSink {
    pub fn new() -> Self {
        Self {
            created: Arc::new(RwLock::new(Vec::new())),
            updated: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicI64::new(1000),
            fail_creates: Arc::new(RwLock::new(false)),
            fail_deletes: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn created(&self) -> Vec<Measurement> {
        self.created.read().await.clone()
    }

    pub async fn updated(&self) -> Vec<Measurement> {
        self.updated.read().await.clone()
    }

    pub async fn deleted(&self) -> Vec<i64> {
        self.deleted.read().await.clone()
    }

    pub async fn set_fail_creates(&self, fail: bool) {
        *self.fail_creates.write().await = fail;
    }

    pub async fn set_fail_deletes(&self, fail: bool) {
        *self.fail_deletes.write().await = fail;
    }

    fn error() -> SinkError {
        SinkError::UnexpectedResponse {
            status: 500,
            body: "mock failure".to_string(),
        }
    }
}

#[async_trait]
impl MeasurementSink for MockMeasurementSink {
    async fn create_measurement(&self, measurement: &Measurement) -> Result<i64, SinkError> {
        if *self.fail_creates.read().await {
            return Err(Self::error());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.write().await.push(measurement.clone());
        Ok(id)
    }

    async fn update_measurement(&self, measurement: &Measurement) -> Result<(), SinkError> {
        self.updated.write().await.push(measurement.clone());
        Ok(())
    }

    async fn delete_measurement(&self, id: i64) -> Result<(), SinkError> {
        if *self.fail_deletes.read().await {
            return Err(Self::error());
        }
        self.deleted.write().await.push(id);
        Ok(())
    }
}
