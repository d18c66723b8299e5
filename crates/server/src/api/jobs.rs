//! Capture job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use platecap_core::job::{CaptureConfig, CaptureJob, CaptureJobRequest};
use platecap_core::orchestrator::OrchestratorError;

use super::middleware::AuthIdentity;
use crate::state::AppState;

/// Default window for job listings when no range is given.
const DEFAULT_LIST_WINDOW_DAYS: i64 = 1;

/// Request body for submitting a capture job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobBody {
    /// Path to the raw instrument data to capture.
    pub source_path: String,
    /// Inline capture configuration.
    pub capture_config: Option<CaptureConfig>,
    /// Id of a stored capture configuration (used when no inline config).
    pub capture_config_id: Option<i64>,
}

/// Query parameters for listing jobs by creation date.
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn error_response(e: OrchestratorError) -> (StatusCode, Json<JobErrorResponse>) {
    let status = match &e {
        OrchestratorError::AdmissionRefused | OrchestratorError::NotCancellable => {
            StatusCode::CONFLICT
        }
        OrchestratorError::ConfigNotFound(_) | OrchestratorError::JobNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        OrchestratorError::MissingIdentifyStage | OrchestratorError::InvalidConfig(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(JobErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Submit a capture job.
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    AuthIdentity(identity): AuthIdentity,
    Json(body): Json<SubmitJobBody>,
) -> Result<(StatusCode, Json<CaptureJob>), impl IntoResponse> {
    let request = CaptureJobRequest {
        source_path: body.source_path,
        capture_config: body.capture_config,
        capture_config_id: body.capture_config_id,
        created_by: Some(identity.user_id),
    };

    match state.orchestrator().submit(request).await {
        Ok(job) => Ok((StatusCode::CREATED, Json(job))),
        Err(e) => Err(error_response(e)),
    }
}

/// List jobs created in a date range, events included.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<Vec<CaptureJob>>, impl IntoResponse> {
    let to = params.to.unwrap_or_else(Utc::now);
    let from = params
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_LIST_WINDOW_DAYS));

    match state.orchestrator().list_jobs(from, to) {
        Ok(jobs) => Ok(Json(jobs)),
        Err(e) => Err(error_response(e)),
    }
}

/// Get a job by id, events included.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CaptureJob>, impl IntoResponse> {
    match state.orchestrator().get_job(id) {
        Ok(job) => Ok(Json(job)),
        Err(e) => Err(error_response(e)),
    }
}

/// Request cancellation of a running job.
///
/// The job rolls back at its next stage boundary; the returned record
/// already carries the Cancelled status.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CaptureJob>, impl IntoResponse> {
    match state.orchestrator().cancel(id) {
        Ok(job) => Ok(Json(job)),
        Err(e) => Err(error_response(e)),
    }
}
