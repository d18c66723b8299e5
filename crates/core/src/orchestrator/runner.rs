//! Capture job orchestrator implementation.
//!
//! Drives capture jobs through the stage pipeline:
//! - IdentifyingMeasurements: one script run over the source path
//! - CapturingWellData / CapturingSubWellData / CapturingImageData: one
//!   script run per identified measurement, unconfigured stages skipped
//!
//! Stage scripts execute externally; the orchestrator dispatches a request
//! and makes no further progress on that job until the matching update
//! arrives. Cancellation is observed at stage boundaries only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bridge::{
    ScriptDispatcher, ScriptExecutionRequest, ScriptExecutionUpdate, ScriptStatus,
};
use crate::filestore::FileStore;
use crate::job::{
    CaptureConfig, CaptureJob, CaptureJobRequest, EventType, JobStatus, JobStore, StageConfig,
};
use crate::measurement::Measurement;
use crate::metrics;
use crate::notify::{JobNotifier, JobUpdatedNotification};
use crate::sink::{MeasurementSink, MetadataSink};

use super::config::OrchestratorConfig;
use super::registry::ActiveJobRegistry;
use super::types::{ActiveJob, ActiveJobStage, OrchestratorError, StageContext};

/// Fallback identity for jobs submitted without one.
pub const SYSTEM_USER: &str = "System";

/// Outcome of a completed stage.
enum StageOutcome {
    /// More stages (or measurements) remain.
    Continue,
    /// The job reached a terminal status.
    Done,
}

/// The capture orchestrator.
pub struct CaptureOrchestrator {
    config: OrchestratorConfig,
    job_store: Arc<dyn JobStore>,
    config_store: Arc<dyn FileStore>,
    script_store: Arc<dyn FileStore>,
    dispatcher: Arc<dyn ScriptDispatcher>,
    measurement_sink: Arc<dyn MeasurementSink>,
    metadata_sink: Arc<dyn MetadataSink>,
    registry: Arc<ActiveJobRegistry>,
    notifier: JobNotifier,
}

impl CaptureOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        job_store: Arc<dyn JobStore>,
        config_store: Arc<dyn FileStore>,
        script_store: Arc<dyn FileStore>,
        dispatcher: Arc<dyn ScriptDispatcher>,
        measurement_sink: Arc<dyn MeasurementSink>,
        metadata_sink: Arc<dyn MetadataSink>,
        notifier: JobNotifier,
    ) -> Self {
        let registry = Arc::new(ActiveJobRegistry::new(config.max_active_jobs));
        registry.add_observer(Arc::new(|current, _| {
            metrics::ACTIVE_JOBS.set(current as i64);
        }));

        Self {
            config,
            job_store,
            config_store,
            script_store,
            dispatcher,
            measurement_sink,
            metadata_sink,
            registry,
            notifier,
        }
    }

    pub fn registry(&self) -> Arc<ActiveJobRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn notifier(&self) -> JobNotifier {
        self.notifier.clone()
    }

    /// Submit a capture job: persist it, admit it into the registry and
    /// start executing it in the background.
    ///
    /// Returns the persisted job record (status `Submitted`; it moves to
    /// `Running` as execution begins).
    pub async fn submit(
        self: &Arc<Self>,
        request: CaptureJobRequest,
    ) -> Result<CaptureJob, OrchestratorError> {
        let capture_config = self.resolve_config(&request)?;

        if !self.registry.has_capacity() {
            debug!(source_path = %request.source_path, "Capture job refused: no capacity");
            metrics::JOBS_REFUSED.inc();
            return Err(OrchestratorError::AdmissionRefused);
        }

        let created_by = request.created_by.as_deref().unwrap_or(SYSTEM_USER);
        let job = self
            .job_store
            .create(created_by, &request.source_path, &capture_config)?;
        metrics::JOBS_SUBMITTED.inc();
        info!(job_id = job.id, source_path = %job.source_path, "Capture job submitted");

        let Some(handle) = self.registry.admit(ActiveJob::new(job.clone())) else {
            // Lost the admission race after persisting: the record stays
            // Submitted and never runs.
            self.job_store.append_event(
                job.id,
                EventType::Warning,
                "Admission refused: active job limit reached",
            )?;
            warn!(job_id = job.id, "Capture job refused after persisting");
            metrics::JOBS_REFUSED.inc();
            return Err(OrchestratorError::AdmissionRefused);
        };

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut active = handle.lock().await;
            if let Err(e) = orchestrator.begin(&mut active).await {
                orchestrator.abort(&mut active, Some(&e.to_string())).await;
            }
        });

        Ok(job)
    }

    /// Request cancellation of a job. The running task observes the
    /// persisted status at its next stage boundary and rolls back.
    pub fn cancel(&self, job_id: i64) -> Result<CaptureJob, OrchestratorError> {
        let job = self
            .job_store
            .get(job_id)?
            .ok_or(OrchestratorError::JobNotFound(job_id))?;

        if !job.status_code.is_cancellable() {
            return Err(OrchestratorError::NotCancellable);
        }

        self.job_store.append_event(
            job_id,
            EventType::Warning,
            "Capture job cancelled by request",
        )?;
        self.job_store.append_event(
            job_id,
            EventType::Info,
            &format!("Status changed to {}", JobStatus::Cancelled),
        )?;
        let updated = self
            .job_store
            .update_status(job_id, JobStatus::Cancelled, None)?;
        info!(job_id, "Capture job cancellation requested");

        self.notifier.notify(JobUpdatedNotification {
            job_id,
            status: JobStatus::Cancelled,
            status_message: None,
            measurement_id: None,
            barcode: None,
        });

        Ok(updated)
    }

    /// A job record with its event history attached.
    pub fn get_job(&self, job_id: i64) -> Result<CaptureJob, OrchestratorError> {
        let mut job = self
            .job_store
            .get(job_id)?
            .ok_or(OrchestratorError::JobNotFound(job_id))?;
        job.events = self.job_store.events(job_id)?;
        Ok(job)
    }

    /// Jobs created in the given date range, events attached.
    pub fn list_jobs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CaptureJob>, OrchestratorError> {
        let mut jobs = self.job_store.list(from, to)?;
        for job in &mut jobs {
            job.events = self.job_store.events(job.id)?;
        }
        Ok(jobs)
    }

    /// Feed an inbound script execution update into the state machine.
    ///
    /// Updates that match no active job (stale, duplicate, or for a job
    /// already removed) are ignored.
    pub async fn handle_script_update(&self, update: ScriptExecutionUpdate) {
        let Some(handle) = self.registry.resolve(update.input_id).await else {
            debug!(input_id = %update.input_id, "Ignoring unknown script execution update");
            return;
        };

        let mut active = handle.lock().await;
        active.active_script_ids.remove(&update.input_id);

        // An update arrival is a stage boundary: observe a pending cancel
        // before applying the stage's effects.
        match self.cancel_requested(&active) {
            Ok(true) => {
                info!(job_id = active.job.id, stage = %active.stage, "Cancellation observed at stage boundary");
                metrics::JOBS_CANCELLED.inc();
                active.job.status_code = JobStatus::Cancelled;
                self.abort(&mut active, None).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                self.abort(&mut active, Some(&e.to_string())).await;
                return;
            }
        }

        if update.status_code != ScriptStatus::Ok {
            let message = update
                .status_message
                .unwrap_or_else(|| "Script execution failed".to_string());
            self.abort(&mut active, Some(&message)).await;
            return;
        }

        match self.complete_stage(&mut active, update.output).await {
            Ok(StageOutcome::Done) => {}
            Ok(StageOutcome::Continue) => {
                if let Err(e) = self.advance(&mut active).await {
                    self.abort(&mut active, Some(&e.to_string())).await;
                }
            }
            Err(e) => {
                self.abort(&mut active, Some(&e.to_string())).await;
            }
        }
    }

    fn resolve_config(
        &self,
        request: &CaptureJobRequest,
    ) -> Result<CaptureConfig, OrchestratorError> {
        if let Some(config) = &request.capture_config {
            return Ok(config.clone());
        }

        let Some(config_id) = request.capture_config_id else {
            return Err(OrchestratorError::InvalidConfig(
                "request carries neither a capture config nor a capture config id".to_string(),
            ));
        };

        let file = self
            .config_store
            .load(config_id)?
            .ok_or(OrchestratorError::ConfigNotFound(config_id))?;
        serde_json::from_str(&file.value)
            .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))
    }

    async fn begin(&self, active: &mut ActiveJob) -> Result<(), OrchestratorError> {
        self.update_job_status(active, JobStatus::Running, None)?;

        // A config without an identification stage aborts the persisted job.
        if active.job.capture_config.identify_measurements.is_none() {
            return Err(OrchestratorError::MissingIdentifyStage);
        }

        self.advance(active).await
    }

    /// Move the job forward until it either dispatches a script (and must
    /// wait for the update) or reaches a terminal status.
    async fn advance(&self, active: &mut ActiveJob) -> Result<(), OrchestratorError> {
        loop {
            if self.cancel_requested(active)? {
                info!(job_id = active.job.id, stage = %active.stage, "Cancellation observed at stage boundary");
                metrics::JOBS_CANCELLED.inc();
                active.job.status_code = JobStatus::Cancelled;
                self.abort(active, None).await;
                return Ok(());
            }

            if let Some(stage_config) = active.stage.stage_config(&active.job.capture_config) {
                let stage_config = stage_config.clone();
                let correlation_id = self.invoke_stage_script(active, &stage_config).await?;
                active.active_script_ids.insert(correlation_id);
                return Ok(());
            }

            // Unconfigured stage: complete it with no output.
            if let StageOutcome::Done = self.complete_stage(active, None).await? {
                return Ok(());
            }
        }
    }

    /// Apply a finished stage's effects and step the stage pointer.
    async fn complete_stage(
        &self,
        active: &mut ActiveJob,
        output: Option<Value>,
    ) -> Result<StageOutcome, OrchestratorError> {
        match active.stage {
            ActiveJobStage::IdentifyingMeasurements => {
                let measurements = Self::parse_measurements(output)?;
                info!(
                    job_id = active.job.id,
                    count = measurements.len(),
                    "Measurements identified"
                );
                active.measurements = measurements;
                for measurement in &mut active.measurements {
                    let id = self.measurement_sink.create_measurement(measurement).await?;
                    measurement.id = Some(id);
                }
                self.job_store.append_event(
                    active.job.id,
                    EventType::Info,
                    &format!("Identified {} measurement(s)", active.measurements.len()),
                )?;
                active.current_measurement_index = 0;
                active.stage = ActiveJobStage::CapturingWellData;
                Ok(StageOutcome::Continue)
            }
            ActiveJobStage::CapturingWellData => {
                Self::apply_measurement_output(active, output)?;
                active.stage = ActiveJobStage::CapturingSubWellData;
                Ok(StageOutcome::Continue)
            }
            ActiveJobStage::CapturingSubWellData => {
                Self::apply_measurement_output(active, output)?;
                active.stage = ActiveJobStage::CapturingImageData;
                Ok(StageOutcome::Continue)
            }
            ActiveJobStage::CapturingImageData => {
                Self::apply_measurement_output(active, output)?;
                self.finish_measurement(active).await?;

                active.current_measurement_index += 1;
                if active.current_measurement_index < active.measurements.len() {
                    active.stage = ActiveJobStage::CapturingWellData;
                    Ok(StageOutcome::Continue)
                } else {
                    self.complete_job(active)?;
                    Ok(StageOutcome::Done)
                }
            }
        }
    }

    /// Resolve the stage script by name, dispatch the execution request and
    /// return its correlation id.
    async fn invoke_stage_script(
        &self,
        active: &ActiveJob,
        stage_config: &StageConfig,
    ) -> Result<Uuid, OrchestratorError> {
        let script = self
            .script_store
            .load_by_name(&stage_config.script_id)?
            .ok_or_else(|| OrchestratorError::ScriptNotFound(stage_config.script_id.clone()))?;

        if let Some(measurement) = active.current_measurement() {
            self.job_store.append_event(
                active.job.id,
                EventType::Info,
                &format!(
                    "Measurement {}: invoking {}",
                    measurement.name, stage_config.script_id
                ),
            )?;
        }

        let context = StageContext {
            source_path: (active.stage == ActiveJobStage::IdentifyingMeasurements)
                .then_some(active.job.source_path.as_str()),
            module_config: stage_config,
            capture_job: &active.job,
            measurement: active.current_measurement(),
        };

        let request = ScriptExecutionRequest {
            id: Uuid::new_v4(),
            language: self.config.script_language.clone(),
            script: script.value,
            input: serde_json::to_string(&context)?,
        };
        let correlation_id = request.id;

        debug!(
            job_id = active.job.id,
            stage = %active.stage,
            script = %stage_config.script_id,
            request_id = %correlation_id,
            "Invoking capture script"
        );
        metrics::SCRIPT_REQUESTS.inc();
        self.dispatcher.dispatch(request).await?;

        Ok(correlation_id)
    }

    /// Push the completed measurement downstream: update its data, attach
    /// properties and tags, notify subscribers.
    async fn finish_measurement(&self, active: &mut ActiveJob) -> Result<(), OrchestratorError> {
        let index = active.current_measurement_index;
        let Some(measurement) = active.measurements.get(index) else {
            return Ok(());
        };

        self.measurement_sink.update_measurement(measurement).await?;

        if let Some(measurement_id) = measurement.id {
            for (name, value) in &measurement.properties {
                self.metadata_sink
                    .post_property(measurement_id, name, value)
                    .await?;
            }
            for tag in &measurement.tags {
                self.metadata_sink.post_tag(measurement_id, tag).await?;
            }
        }

        self.job_store.append_event(
            active.job.id,
            EventType::Info,
            &format!("Captured measurement {}", measurement.barcode),
        )?;

        self.notifier.notify(JobUpdatedNotification {
            job_id: active.job.id,
            status: active.job.status_code,
            status_message: None,
            measurement_id: measurement.id,
            barcode: Some(measurement.barcode.clone()),
        });

        Ok(())
    }

    fn complete_job(&self, active: &mut ActiveJob) -> Result<(), OrchestratorError> {
        self.update_job_status(active, JobStatus::Completed, None)?;
        metrics::JOBS_COMPLETED.inc();
        info!(
            job_id = active.job.id,
            measurements = active.measurements.len(),
            "Capture job completed"
        );
        self.registry.release(active.job.id);
        Ok(())
    }

    /// Abort a job: mark it failed (unless already terminal), delete any
    /// measurements registered so far and free the registry slot.
    ///
    /// Rollback is best effort: a failing delete is logged and the loop
    /// moves on.
    async fn abort(&self, active: &mut ActiveJob, error: Option<&str>) {
        if let Some(message) = error {
            error!(job_id = active.job.id, message, "Aborting capture job");
            metrics::JOBS_FAILED.inc();
            if let Err(e) = self.update_job_status(active, JobStatus::Error, Some(message)) {
                error!(job_id = active.job.id, error = %e, "Failed to persist job failure");
            }
        }

        for measurement in &active.measurements {
            if let Some(measurement_id) = measurement.id {
                if let Err(e) = self.measurement_sink.delete_measurement(measurement_id).await {
                    warn!(
                        job_id = active.job.id,
                        measurement_id,
                        error = %e,
                        "Failed to roll back measurement"
                    );
                }
            }
        }

        self.registry.release(active.job.id);
    }

    /// Whether a cancel was persisted for this job since the last boundary.
    fn cancel_requested(&self, active: &ActiveJob) -> Result<bool, OrchestratorError> {
        let persisted = self
            .job_store
            .get(active.job.id)?
            .ok_or(OrchestratorError::JobNotFound(active.job.id))?;
        Ok(persisted.status_code == JobStatus::Cancelled)
    }

    /// Persist a status change and mirror it on the in-memory copy.
    ///
    /// Terminal statuses are never overwritten; a write that races a cancel
    /// is dropped and the cancel wins at the next boundary.
    fn update_job_status(
        &self,
        active: &mut ActiveJob,
        status: JobStatus,
        message: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let persisted = self
            .job_store
            .get(active.job.id)?
            .ok_or(OrchestratorError::JobNotFound(active.job.id))?;
        if persisted.status_code.is_terminal() {
            debug!(
                job_id = active.job.id,
                current = %persisted.status_code,
                requested = %status,
                "Skipping status change on terminal job"
            );
            active.job.status_code = persisted.status_code;
            return Ok(());
        }

        if persisted.status_code != status {
            let event_type = if status == JobStatus::Error {
                EventType::Error
            } else {
                EventType::Info
            };
            self.job_store.append_event(
                active.job.id,
                event_type,
                &format!("Status changed to {status}"),
            )?;
        }

        let updated = self.job_store.update_status(active.job.id, status, message)?;
        active.job.status_code = updated.status_code;
        active.job.status_message = updated.status_message.clone();

        self.notifier.notify(JobUpdatedNotification {
            job_id: active.job.id,
            status: updated.status_code,
            status_message: updated.status_message,
            measurement_id: None,
            barcode: None,
        });

        Ok(())
    }

    /// Script output arrives either as a JSON value or as a JSON-encoded
    /// string; normalize to a value.
    fn normalize_output(output: Value) -> Result<Value, OrchestratorError> {
        match output {
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|e| OrchestratorError::MalformedStageOutput(e.to_string())),
            other => Ok(other),
        }
    }

    fn parse_measurements(output: Option<Value>) -> Result<Vec<Measurement>, OrchestratorError> {
        let output = output.ok_or_else(|| {
            OrchestratorError::MalformedStageOutput(
                "measurement identification produced no output".to_string(),
            )
        })?;
        let value = Self::normalize_output(output)?;
        let measurements: Vec<Measurement> = serde_json::from_value(value)
            .map_err(|e| OrchestratorError::MalformedStageOutput(e.to_string()))?;
        if measurements.is_empty() {
            return Err(OrchestratorError::MalformedStageOutput(
                "no measurements identified".to_string(),
            ));
        }
        Ok(measurements)
    }

    /// A gather stage's output may carry a replacement for the current
    /// measurement under its `measurement` key; when present it replaces the
    /// in-memory measurement wholesale. Output without that key leaves the
    /// measurement untouched.
    fn apply_measurement_output(
        active: &mut ActiveJob,
        output: Option<Value>,
    ) -> Result<(), OrchestratorError> {
        let Some(output) = output else {
            return Ok(());
        };
        if output.is_null() {
            return Ok(());
        }

        let value = Self::normalize_output(output)?;
        let Some(replacement) = value.get("measurement") else {
            return Ok(());
        };
        if replacement.is_null() {
            return Ok(());
        }

        let mut measurement: Measurement = serde_json::from_value(replacement.clone())
            .map_err(|e| OrchestratorError::MalformedStageOutput(e.to_string()))?;

        let index = active.current_measurement_index;
        if let Some(current) = active.measurements.get_mut(index) {
            if measurement.id.is_none() {
                measurement.id = current.id;
            }
            *current = measurement;
        }
        Ok(())
    }
}
