//! Versioned file store data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;

/// Store discriminator for capture configurations.
pub const CAPTURE_CONFIG_STORE: &str = "capture-configs";

/// Store discriminator for capture scripts.
pub const CAPTURE_SCRIPT_STORE: &str = "capture-scripts";

/// A versioned named blob: a capture configuration or a capture script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: i64,
    pub name: String,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
    pub created_on: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl StoredFile {
    /// Only the creator or an admin may update or delete a stored file.
    pub fn can_edit(&self, identity: &Identity) -> bool {
        identity.admin || self.created_by == identity.user_id
    }
}

/// Payload for creating a new stored file. Version starts at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
}

/// Payload for updating a stored file. Any update bumps the version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}
