//! Outbound script execution dispatch.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::ScriptExecutionRequest;

/// Error type for script dispatch.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("script execution channel closed")]
    ChannelClosed,
}

/// Publishes script execution requests to the script execution service.
#[async_trait]
pub trait ScriptDispatcher: Send + Sync {
    async fn dispatch(&self, request: ScriptExecutionRequest) -> Result<(), BridgeError>;
}

/// Dispatcher backed by a tokio mpsc channel.
///
/// The receiving half is owned by whatever forwards requests to the actual
/// execution service (or by a test harness).
pub struct ChannelDispatcher {
    tx: mpsc::Sender<ScriptExecutionRequest>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::Sender<ScriptExecutionRequest>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ScriptDispatcher for ChannelDispatcher {
    async fn dispatch(&self, request: ScriptExecutionRequest) -> Result<(), BridgeError> {
        debug!(request_id = %request.id, "Dispatching script execution request");
        self.tx
            .send(request)
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }
}
