//! Mock metadata sink for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::sink::{MetadataSink, SinkError};

/// A recorded property post.
#[derive(Debug, Clone)]
pub struct RecordedProperty {
    pub measurement_id: i64,
    pub name: String,
    pub value: Value,
}

/// Mock implementation of the MetadataSink trait.
#[derive(Debug, Default)]
pub struct MockMetadataSink {
    properties: Arc<RwLock<Vec<RecordedProperty>>>,
    tags: Arc<RwLock<Vec<(i64, String)>>>,
}

impl MockMetadataSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn properties(&self) -> Vec<RecordedProperty> {
        self.properties.read().await.clone()
    }

    pub async fn tags(&self) -> Vec<(i64, String)> {
        self.tags.read().await.clone()
    }
}

#[async_trait]
impl MetadataSink for MockMetadataSink {
    async fn post_property(
        &self,
        measurement_id: i64,
        name: &str,
        value: &Value,
    ) -> Result<(), SinkError> {
        self.properties.write().await.push(RecordedProperty {
            measurement_id,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    async fn post_tag(&self, measurement_id: i64, tag: &str) -> Result<(), SinkError> {
        self.tags.write().await.push((measurement_id, tag.to_string()));
        Ok(())
    }
}
