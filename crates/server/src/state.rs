use std::sync::Arc;

use platecap_core::filestore::FileStore;
use platecap_core::orchestrator::CaptureOrchestrator;
use platecap_core::{Authenticator, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    orchestrator: Arc<CaptureOrchestrator>,
    config_store: Arc<dyn FileStore>,
    script_store: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        orchestrator: Arc<CaptureOrchestrator>,
        config_store: Arc<dyn FileStore>,
        script_store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            config,
            authenticator,
            orchestrator,
            config_store,
            script_store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn orchestrator(&self) -> &Arc<CaptureOrchestrator> {
        &self.orchestrator
    }

    pub fn config_store(&self) -> Arc<dyn FileStore> {
        Arc::clone(&self.config_store)
    }

    pub fn script_store(&self) -> Arc<dyn FileStore> {
        Arc::clone(&self.script_store)
    }
}
