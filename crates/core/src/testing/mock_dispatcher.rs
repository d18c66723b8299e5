//! Mock script dispatcher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bridge::{BridgeError, ScriptDispatcher, ScriptExecutionRequest};

/// Mock implementation of the ScriptDispatcher trait.
///
/// Records every dispatched request for assertions instead of executing
/// anything; tests answer the requests by feeding
/// `ScriptExecutionUpdate`s back into the orchestrator.
#[derive(Debug, Default)]
pub struct MockScriptDispatcher {
    requests: Arc<RwLock<Vec<ScriptExecutionRequest>>>,
    fail_next: Arc<RwLock<bool>>,
}

impl MockScriptDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests dispatched so far.
    pub async fn requests(&self) -> Vec<ScriptExecutionRequest> {
        self.requests.read().await.clone()
    }

    /// The most recently dispatched request.
    pub async fn last_request(&self) -> Option<ScriptExecutionRequest> {
        self.requests.read().await.last().cloned()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Make the next dispatch fail with a closed-channel error.
    pub async fn fail_next(&self) {
        *self.fail_next.write().await = true;
    }
}

#[async_trait]
impl ScriptDispatcher for MockScriptDispatcher {
    async fn dispatch(&self, request: ScriptExecutionRequest) -> Result<(), BridgeError> {
        let mut fail = self.fail_next.write().await;
        if *fail {
            *fail = false;
            return Err(BridgeError::ChannelClosed);
        }
        drop(fail);

        self.requests.write().await.push(request);
        Ok(())
    }
}
