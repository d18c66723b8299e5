//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the capture orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of jobs allowed to run concurrently.
    /// Submissions beyond the ceiling are refused.
    #[serde(default = "default_max_active_jobs")]
    pub max_active_jobs: usize,

    /// Language tag stamped on outgoing script execution requests.
    #[serde(default = "default_script_language")]
    pub script_language: String,
}

fn default_max_active_jobs() -> usize {
    3
}

fn default_script_language() -> String {
    "JS".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: default_max_active_jobs(),
            script_language: default_script_language(),
        }
    }
}
