use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    /// Admin capability: may edit and delete stored files regardless of
    /// creator.
    pub admin: bool,
}

impl Identity {
    /// Anonymous identity for the "none" auth method. Without
    /// authentication there is no creator to distinguish, so every caller
    /// carries the admin capability.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            admin: true,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: "api_key".to_string(),
            admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: "api_key".to_string(),
            admin: true,
        }
    }
}
