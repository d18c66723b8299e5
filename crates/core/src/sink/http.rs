//! HTTP implementations of the downstream sinks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::SinksConfig;
use crate::measurement::Measurement;

use super::{MeasurementSink, MetadataSink, SinkError};

fn build_client(timeout_secs: u32) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs as u64))
        .build()
        .expect("Failed to create HTTP client")
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, SinkError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(SinkError::UnexpectedResponse { status, body })
}

/// Client for the measurement service REST API.
pub struct HttpMeasurementSink {
    client: Client,
    base_url: String,
}

impl HttpMeasurementSink {
    pub fn new(config: &SinksConfig) -> Self {
        Self {
            client: build_client(config.timeout_secs),
            base_url: config.measurement_service_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedMeasurement {
    id: i64,
}

#[async_trait]
impl MeasurementSink for HttpMeasurementSink {
    async fn create_measurement(&self, measurement: &Measurement) -> Result<i64, SinkError> {
        let url = format!("{}/measurements", self.base_url);
        debug!(barcode = %measurement.barcode, "Registering measurement");

        let response = self.client.post(&url).json(measurement).send().await?;
        let created: CreatedMeasurement = check_response(response).await?.json().await?;
        Ok(created.id)
    }

    async fn update_measurement(&self, measurement: &Measurement) -> Result<(), SinkError> {
        let id = measurement.id.unwrap_or_default();
        let url = format!("{}/measurements/{}", self.base_url, id);

        let response = self.client.put(&url).json(measurement).send().await?;
        check_response(response).await?;
        Ok(())
    }

    async fn delete_measurement(&self, id: i64) -> Result<(), SinkError> {
        let url = format!("{}/measurements/{}", self.base_url, id);
        debug!(measurement_id = id, "Deleting measurement");

        let response = self.client.delete(&url).send().await?;
        check_response(response).await?;
        Ok(())
    }
}

/// Client for the metadata service REST API.
///
/// Properties and tags are posted against object class `MEASUREMENT`,
/// matching the metadata service contract.
pub struct HttpMetadataSink {
    client: Client,
    base_url: String,
}

impl HttpMetadataSink {
    pub fn new(config: &SinksConfig) -> Self {
        Self {
            client: build_client(config.timeout_secs),
            base_url: config.metadata_service_url.trim_end_matches('/').to_string(),
        }
    }
}

const MEASUREMENT_OBJECT_CLASS: &str = "MEASUREMENT";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PropertyEnvelope<'a> {
    object_id: i64,
    object_class: &'static str,
    property_name: &'a str,
    property_value: &'a Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TagEnvelope<'a> {
    object_id: i64,
    object_class: &'static str,
    tag: &'a str,
}

#[async_trait]
impl MetadataSink for HttpMetadataSink {
    async fn post_property(
        &self,
        measurement_id: i64,
        name: &str,
        value: &Value,
    ) -> Result<(), SinkError> {
        let url = format!("{}/properties", self.base_url);
        let envelope = PropertyEnvelope {
            object_id: measurement_id,
            object_class: MEASUREMENT_OBJECT_CLASS,
            property_name: name,
            property_value: value,
        };

        let response = self.client.post(&url).json(&envelope).send().await?;
        check_response(response).await?;
        Ok(())
    }

    async fn post_tag(&self, measurement_id: i64, tag: &str) -> Result<(), SinkError> {
        let url = format!("{}/tags", self.base_url);
        let envelope = TagEnvelope {
            object_id: measurement_id,
            object_class: MEASUREMENT_OBJECT_CLASS,
            tag,
        };

        let response = self.client.post(&url).json(&envelope).send().await?;
        check_response(response).await?;
        Ok(())
    }
}
