use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - Server port is not 0
/// - Active-job ceiling is at least 1
/// - Sink URLs are present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_active_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_active_jobs must be at least 1".to_string(),
        ));
    }

    if config.sinks.measurement_service_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "sinks.measurement_service_url cannot be empty".to_string(),
        ));
    }
    if config.sinks.metadata_service_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "sinks.metadata_service_url cannot be empty".to_string(),
        ));
    }

    Ok(())
}
