//! End-to-end capture job lifecycle tests with mocked collaborators.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use platecap_core::bridge::ScriptExecutionRequest;
use platecap_core::filestore::{
    FileStore, NewFile, SqliteFileStore, CAPTURE_CONFIG_STORE, CAPTURE_SCRIPT_STORE,
};
use platecap_core::job::{
    CaptureConfig, CaptureJob, CaptureJobRequest, EventType, JobStatus, JobStore, SqliteJobStore,
};
use platecap_core::notify::JobNotifier;
use platecap_core::orchestrator::{CaptureOrchestrator, OrchestratorConfig, OrchestratorError};
use platecap_core::testing::{
    fixtures, MockMeasurementSink, MockMetadataSink, MockScriptDispatcher,
};

struct TestHarness {
    orchestrator: Arc<CaptureOrchestrator>,
    job_store: Arc<SqliteJobStore>,
    config_store: Arc<SqliteFileStore>,
    dispatcher: Arc<MockScriptDispatcher>,
    measurement_sink: Arc<MockMeasurementSink>,
    metadata_sink: Arc<MockMetadataSink>,
}

impl TestHarness {
    fn new(max_active_jobs: usize) -> Self {
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let config_store = Arc::new(SqliteFileStore::in_memory(CAPTURE_CONFIG_STORE).unwrap());
        let script_store = Arc::new(SqliteFileStore::in_memory(CAPTURE_SCRIPT_STORE).unwrap());
        let dispatcher = Arc::new(MockScriptDispatcher::new());
        let measurement_sink = Arc::new(MockMeasurementSink::new());
        let metadata_sink = Arc::new(MockMetadataSink::new());

        for name in [
            "identify.measurements",
            "gather.welldata",
            "gather.subwelldata",
            "gather.imagedata",
        ] {
            script_store
                .create(
                    NewFile {
                        name: name.to_string(),
                        description: None,
                        value: format!("// {name}"),
                    },
                    "System",
                )
                .unwrap();
        }

        let orchestrator = Arc::new(CaptureOrchestrator::new(
            OrchestratorConfig {
                max_active_jobs,
                script_language: "JS".to_string(),
            },
            Arc::clone(&job_store) as Arc<dyn JobStore>,
            Arc::clone(&config_store) as Arc<dyn FileStore>,
            Arc::clone(&script_store) as Arc<dyn FileStore>,
            Arc::clone(&dispatcher) as Arc<dyn platecap_core::bridge::ScriptDispatcher>,
            Arc::clone(&measurement_sink) as Arc<dyn platecap_core::sink::MeasurementSink>,
            Arc::clone(&metadata_sink) as Arc<dyn platecap_core::sink::MetadataSink>,
            JobNotifier::default(),
        ));

        Self {
            orchestrator,
            job_store,
            config_store,
            dispatcher,
            measurement_sink,
            metadata_sink,
        }
    }

    async fn submit(&self, config: CaptureConfig) -> Result<CaptureJob, OrchestratorError> {
        self.orchestrator
            .submit(CaptureJobRequest {
                source_path: "/mnt/plates/run1".to_string(),
                capture_config: Some(config),
                capture_config_id: None,
                created_by: None,
            })
            .await
    }

    /// Wait until the dispatcher has recorded `count` requests.
    async fn wait_for_requests(&self, count: usize) -> Vec<ScriptExecutionRequest> {
        for _ in 0..200 {
            let requests = self.dispatcher.requests().await;
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {count} script requests, got {}",
            self.dispatcher.request_count().await
        );
    }

    /// Wait until the job reaches the given status.
    async fn wait_for_status(&self, job_id: i64, status: JobStatus) -> CaptureJob {
        for _ in 0..200 {
            let job = self.job_store.get(job_id).unwrap().unwrap();
            if job.status_code == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for job {job_id} to reach {status}, currently {}",
            self.job_store.get(job_id).unwrap().unwrap().status_code
        );
    }

    /// Answer the most recent script request with a successful update.
    async fn answer_last(&self, output: serde_json::Value) {
        let request = self.dispatcher.last_request().await.unwrap();
        self.orchestrator
            .handle_script_update(fixtures::ok_update(request.id, output))
            .await;
    }
}

fn measurements_json(barcodes: &[&str]) -> serde_json::Value {
    json!(barcodes
        .iter()
        .map(|b| json!({ "name": format!("plate-{b}"), "barcode": b, "rows": 16, "columns": 24 }))
        .collect::<Vec<_>>())
}

#[tokio::test]
async fn identify_only_config_completes_without_gather_invocations() {
    let harness = TestHarness::new(3);
    let job = harness
        .submit(fixtures::identify_only_config())
        .await
        .unwrap();
    assert_eq!(job.status_code, JobStatus::Submitted);

    let requests = harness.wait_for_requests(1).await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].script.contains("identify.measurements"));

    harness.answer_last(measurements_json(&["BC1"])).await;

    let completed = harness.wait_for_status(job.id, JobStatus::Completed).await;
    assert_eq!(completed.status_code, JobStatus::Completed);

    // identify ran once; no gather script was ever dispatched
    assert_eq!(harness.dispatcher.request_count().await, 1);
    assert_eq!(harness.measurement_sink.created().await.len(), 1);
    assert_eq!(harness.measurement_sink.updated().await.len(), 1);
    assert!(harness.measurement_sink.deleted().await.is_empty());
    assert_eq!(harness.orchestrator.registry().count(), 0);
}

#[tokio::test]
async fn full_pipeline_runs_gather_stages_in_order_per_measurement() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::full_capture_config()).await.unwrap();

    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1", "BC2"])).await;

    // Well -> SubWell -> Image for measurement 1, then again for measurement 2.
    for _ in 0..2 {
        for script in ["gather.welldata", "gather.subwelldata", "gather.imagedata"] {
            let request = harness.dispatcher.last_request().await.unwrap();
            assert!(request.script.contains(script), "expected {script}");
            harness.answer_last(serde_json::Value::Null).await;
        }
    }

    harness.wait_for_status(job.id, JobStatus::Completed).await;
    assert_eq!(harness.dispatcher.request_count().await, 7);
    assert_eq!(harness.measurement_sink.updated().await.len(), 2);

    // every gather dispatch is recorded against its measurement
    let job = harness.orchestrator.get_job(job.id).unwrap();
    let details: Vec<_> = job.events.iter().map(|e| e.event_details.as_str()).collect();
    assert!(details.contains(&"Measurement plate-BC1: invoking gather.welldata"));
    assert!(details.contains(&"Measurement plate-BC2: invoking gather.imagedata"));
}

#[tokio::test]
async fn stage_context_carries_source_path_for_identification_only() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::full_capture_config()).await.unwrap();

    let requests = harness.wait_for_requests(1).await;
    let input: serde_json::Value = serde_json::from_str(&requests[0].input).unwrap();
    assert_eq!(input["sourcePath"], "/mnt/plates/run1");
    assert_eq!(input["moduleConfig"]["scriptId"], "identify.measurements");
    assert_eq!(input["captureJob"]["id"], job.id);
    assert!(input.get("measurement").is_none());

    harness.answer_last(measurements_json(&["BC1"])).await;

    let requests = harness.wait_for_requests(2).await;
    let input: serde_json::Value = serde_json::from_str(&requests[1].input).unwrap();
    assert!(input.get("sourcePath").is_none());
    assert_eq!(input["moduleConfig"]["scriptId"], "gather.welldata");
    assert_eq!(input["measurement"]["barcode"], "BC1");
}

#[tokio::test]
async fn unconfigured_stage_is_skipped() {
    let harness = TestHarness::new(3);
    let mut config = fixtures::full_capture_config();
    config.gather_well_data = None;
    let job = harness.submit(config).await.unwrap();

    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1"])).await;

    // The next dispatched script skips straight to subwell data.
    let requests = harness.wait_for_requests(2).await;
    assert!(requests[1].script.contains("gather.subwelldata"));
    harness.answer_last(serde_json::Value::Null).await;

    let requests = harness.wait_for_requests(3).await;
    assert!(requests[2].script.contains("gather.imagedata"));
    harness.answer_last(serde_json::Value::Null).await;

    harness.wait_for_status(job.id, JobStatus::Completed).await;
    for request in harness.dispatcher.requests().await {
        assert!(!request.script.contains("gather.welldata"));
    }
}

#[tokio::test]
async fn gather_output_replaces_current_measurement() {
    let harness = TestHarness::new(3);
    let mut config = fixtures::identify_only_config();
    config.gather_well_data = Some(platecap_core::job::StageConfig::new("gather.welldata"));
    let job = harness.submit(config).await.unwrap();

    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1"])).await;

    harness.wait_for_requests(2).await;
    harness
        .answer_last(json!({
            "measurement": {
                "name": "plate-BC1",
                "barcode": "BC1",
                "rows": 16,
                "columns": 24,
                "wellColumns": ["conc"],
                "welldata": { "conc": [1.0, 2.0] },
                "properties": { "instrument": "reader-7" },
                "tags": ["qc-passed"]
            }
        }))
        .await;

    harness.wait_for_status(job.id, JobStatus::Completed).await;

    let updated = harness.measurement_sink.updated().await;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].well_data.get("conc").unwrap(), &vec![1.0, 2.0]);
    // id assigned at registration survives the replacement
    assert!(updated[0].id.is_some());

    let properties = harness.metadata_sink.properties().await;
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].name, "instrument");
    let tags = harness.metadata_sink.tags().await;
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].1, "qc-passed");
}

#[tokio::test]
async fn gather_output_without_measurement_key_is_ignored() {
    let harness = TestHarness::new(3);
    let mut config = fixtures::identify_only_config();
    config.gather_well_data = Some(platecap_core::job::StageConfig::new("gather.welldata"));
    let job = harness.submit(config).await.unwrap();

    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1"])).await;

    // a script may return diagnostics without touching the measurement
    harness.wait_for_requests(2).await;
    harness
        .answer_last(json!({ "durationMillis": 1200 }))
        .await;

    harness.wait_for_status(job.id, JobStatus::Completed).await;

    let updated = harness.measurement_sink.updated().await;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].barcode, "BC1");
    assert_eq!(updated[0].name, "plate-BC1");
}

#[tokio::test]
async fn script_error_fails_job_and_rolls_back_measurements() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::full_capture_config()).await.unwrap();

    harness.wait_for_requests(1).await;
    harness
        .answer_last(measurements_json(&["BC1", "BC2", "BC3"]))
        .await;

    // fail during the well data stage of the first measurement
    let request = harness.dispatcher.last_request().await.unwrap();
    harness
        .orchestrator
        .handle_script_update(fixtures::error_update(request.id, "parser blew up"))
        .await;

    let failed = harness.wait_for_status(job.id, JobStatus::Error).await;
    assert_eq!(failed.status_message.as_deref(), Some("parser blew up"));

    // all three registered measurements are deleted downstream
    let deleted = harness.measurement_sink.deleted().await;
    assert_eq!(deleted.len(), 3);
    assert_eq!(harness.orchestrator.registry().count(), 0);
}

#[tokio::test]
async fn rollback_continues_past_delete_failures() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::full_capture_config()).await.unwrap();

    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1", "BC2"])).await;

    harness.measurement_sink.set_fail_deletes(true).await;

    let request = harness.dispatcher.last_request().await.unwrap();
    harness
        .orchestrator
        .handle_script_update(fixtures::error_update(request.id, "boom"))
        .await;

    // job still ends in Error and frees its slot even though deletes failed
    harness.wait_for_status(job.id, JobStatus::Error).await;
    assert_eq!(harness.orchestrator.registry().count(), 0);
}

#[tokio::test]
async fn malformed_identification_output_fails_job() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::identify_only_config()).await.unwrap();

    harness.wait_for_requests(1).await;
    harness.answer_last(json!([])).await;

    let failed = harness.wait_for_status(job.id, JobStatus::Error).await;
    assert!(failed
        .status_message
        .unwrap()
        .contains("no measurements identified"));
}

#[tokio::test]
async fn unknown_correlation_id_is_ignored() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::identify_only_config()).await.unwrap();
    harness.wait_for_requests(1).await;

    // stale update that matches no active script execution
    harness
        .orchestrator
        .handle_script_update(fixtures::ok_update(uuid::Uuid::new_v4(), json!([])))
        .await;

    let current = harness.job_store.get(job.id).unwrap().unwrap();
    assert_eq!(current.status_code, JobStatus::Running);

    // the real update still drives the job to completion
    harness.answer_last(measurements_json(&["BC1"])).await;
    harness.wait_for_status(job.id, JobStatus::Completed).await;
}

#[tokio::test]
async fn duplicate_update_is_ignored() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::identify_only_config()).await.unwrap();
    harness.wait_for_requests(1).await;

    let request = harness.dispatcher.last_request().await.unwrap();
    let update = fixtures::ok_update(request.id, measurements_json(&["BC1"]));
    harness.orchestrator.handle_script_update(update.clone()).await;
    harness.wait_for_status(job.id, JobStatus::Completed).await;

    // redelivery after completion matches nothing and changes nothing
    harness.orchestrator.handle_script_update(update).await;
    let job = harness.orchestrator.get_job(job.id).unwrap();
    assert_eq!(job.status_code, JobStatus::Completed);
    assert_eq!(harness.measurement_sink.created().await.len(), 1);
}

#[tokio::test]
async fn status_history_is_recorded_as_events() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::identify_only_config()).await.unwrap();
    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1"])).await;
    harness.wait_for_status(job.id, JobStatus::Completed).await;

    let job = harness.orchestrator.get_job(job.id).unwrap();
    let details: Vec<_> = job.events.iter().map(|e| e.event_details.as_str()).collect();
    assert!(details.contains(&"Status changed to Running"));
    assert!(details.contains(&"Status changed to Completed"));
    assert!(details.contains(&"Identified 1 measurement(s)"));
    assert!(job
        .events
        .iter()
        .all(|e| e.event_type == EventType::Info));
}

#[tokio::test]
async fn completed_job_cannot_be_cancelled() {
    let harness = TestHarness::new(3);
    let job = harness.submit(fixtures::identify_only_config()).await.unwrap();
    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC1"])).await;
    harness.wait_for_status(job.id, JobStatus::Completed).await;

    let result = harness.orchestrator.cancel(job.id);
    assert!(matches!(result, Err(OrchestratorError::NotCancellable)));
}

#[tokio::test]
async fn submit_resolves_config_from_store() {
    let harness = TestHarness::new(3);
    let config_json =
        serde_json::to_string(&fixtures::identify_only_config()).unwrap();
    let stored = harness
        .config_store
        .create(
            NewFile {
                name: "imaging-run".to_string(),
                description: None,
                value: config_json,
            },
            "alice",
        )
        .unwrap();

    let job = harness
        .orchestrator
        .submit(CaptureJobRequest {
            source_path: "/mnt/plates/run2".to_string(),
            capture_config: None,
            capture_config_id: Some(stored.id),
            created_by: Some("alice".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(job.created_by, "alice");

    harness.wait_for_requests(1).await;
    harness.answer_last(measurements_json(&["BC9"])).await;
    harness.wait_for_status(job.id, JobStatus::Completed).await;
}

#[tokio::test]
async fn submit_with_unknown_config_id_fails() {
    let harness = TestHarness::new(3);
    let result = harness
        .orchestrator
        .submit(CaptureJobRequest {
            source_path: "/mnt/plates/run1".to_string(),
            capture_config: None,
            capture_config_id: Some(404),
            created_by: None,
        })
        .await;
    assert!(matches!(result, Err(OrchestratorError::ConfigNotFound(404))));
}

#[tokio::test]
async fn submit_without_identify_stage_aborts_persisted_job() {
    let harness = TestHarness::new(3);
    let job = harness.submit(CaptureConfig::default()).await.unwrap();
    assert_eq!(job.status_code, JobStatus::Submitted);

    // the job record survives; execution aborts before any dispatch
    let failed = harness.wait_for_status(job.id, JobStatus::Error).await;
    assert!(failed
        .status_message
        .unwrap()
        .contains("identification stage"));
    assert_eq!(harness.dispatcher.request_count().await, 0);
    assert_eq!(harness.orchestrator.registry().count(), 0);

    let events: Vec<_> = harness
        .job_store
        .events(job.id)
        .unwrap()
        .iter()
        .map(|e| e.event_details.clone())
        .collect();
    assert!(events.contains(&"Status changed to Running".to_string()));
    assert!(events.contains(&"Status changed to Error".to_string()));
}

#[tokio::test]
async fn missing_script_fails_job() {
    let harness = TestHarness::new(3);
    let mut config = fixtures::identify_only_config();
    config.identify_measurements =
        Some(platecap_core::job::StageConfig::new("no.such.script"));

    let job = harness.submit(config).await.unwrap();
    let failed = harness.wait_for_status(job.id, JobStatus::Error).await;
    assert!(failed.status_message.unwrap().contains("no.such.script"));
    assert_eq!(harness.orchestrator.registry().count(), 0);
}
