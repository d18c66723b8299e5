//! Core capture job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle status of a capture job.
///
/// Statuses only move forward: Submitted -> Running -> one of the terminal
/// statuses. A job never re-enters Running after reaching a terminal status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Running,
    Cancelled,
    Error,
    Completed,
}

impl JobStatus {
    /// Returns true when the job can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Error | JobStatus::Completed
        )
    }

    /// Returns true when a cancel request is still meaningful.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobStatus::Submitted | JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "Submitted",
            JobStatus::Running => "Running",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Error => "Error",
            JobStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Submitted" => Some(JobStatus::Submitted),
            "Running" => Some(JobStatus::Running),
            "Cancelled" => Some(JobStatus::Cancelled),
            "Error" => Some(JobStatus::Error),
            "Completed" => Some(JobStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a capture job event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Info,
    Warning,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Info => "Info",
            EventType::Warning => "Warning",
            EventType::Error => "Error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Info" => Some(EventType::Info),
            "Warning" => Some(EventType::Warning),
            "Error" => Some(EventType::Error),
            _ => None,
        }
    }
}

/// One entry in a capture job's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureJobEvent {
    pub job_id: i64,
    pub event_date: DateTime<Utc>,
    pub event_type: EventType,
    pub event_details: String,
}

/// Configuration for one pipeline stage: which script to run, plus
/// stage-specific parameters that are passed through to the script verbatim.
///
/// `script_id` carries the script *name*; resolution against the script store
/// happens by name. The field name is kept for wire compatibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    pub script_id: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl StageConfig {
    pub fn new(script_id: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            params: Map::new(),
        }
    }
}

/// A capture configuration: up to four stage definitions.
///
/// `identify_measurements` is mandatory at execution time; the gather stages
/// are optional and absence means "skip stage".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identify_measurements: Option<StageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gather_well_data: Option<StageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gather_subwell_data: Option<StageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gather_image_data: Option<StageConfig>,
}

/// A durable capture job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureJob {
    pub id: i64,
    pub create_date: DateTime<Utc>,
    pub created_by: String,
    pub source_path: String,
    pub capture_config: CaptureConfig,
    pub status_code: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Event history, attached on query. Empty on freshly created records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<CaptureJobEvent>,
}

/// An incoming request to capture data from a source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureJobRequest {
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_config: Option<CaptureConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_config_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}
