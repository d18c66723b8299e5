//! Script execution wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An outbound request to execute a capture script.
///
/// `id` is the correlation id; the matching [`ScriptExecutionUpdate`] carries
/// it back as `input_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExecutionRequest {
    pub id: Uuid,
    pub language: String,
    pub script: String,
    /// JSON-encoded stage context, passed to the script verbatim.
    pub input: String,
}

/// Outcome reported by the script execution service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptStatus {
    Ok,
    ScriptError,
    #[serde(other)]
    Other,
}

/// An inbound script execution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExecutionUpdate {
    pub input_id: Uuid,
    pub status_code: ScriptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}
