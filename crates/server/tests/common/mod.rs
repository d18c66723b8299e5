//! Common test utilities for API testing with mocks.
//!
//! Provides a test fixture that builds the full router in-process with mock
//! implementations of the script dispatcher and the downstream sinks, so
//! capture jobs can be driven end to end without external infrastructure.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use platecap_core::config::{AuthConfig, DatabaseConfig, ServerConfig, SinksConfig};
use platecap_core::filestore::{
    FileStore, NewFile, SqliteFileStore, CAPTURE_CONFIG_STORE, CAPTURE_SCRIPT_STORE,
};
use platecap_core::job::SqliteJobStore;
use platecap_core::notify::JobNotifier;
use platecap_core::orchestrator::{CaptureOrchestrator, OrchestratorConfig};
use platecap_core::testing::{MockMeasurementSink, MockMetadataSink, MockScriptDispatcher};
use platecap_core::{create_authenticator, AuthMethod, Authenticator, Config};

use platecap_server::api::create_router;
use platecap_server::state::AppState;

/// Re-export fixtures for test convenience
pub use platecap_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The orchestrator behind the router
    pub orchestrator: Arc<CaptureOrchestrator>,
    /// Mock script dispatcher - inspect dispatched requests
    pub dispatcher: Arc<MockScriptDispatcher>,
    /// Mock measurement sink - inspect created/deleted measurements
    pub measurement_sink: Arc<MockMeasurementSink>,
    /// Capture config store
    pub config_store: Arc<dyn FileStore>,
    /// Capture script store
    pub script_store: Arc<dyn FileStore>,
    /// API key to send with requests, if the fixture uses api_key auth
    api_key: Option<String>,
}

/// A decoded HTTP response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture with `none` auth: every caller is anonymous with admin
    /// capability.
    pub fn new() -> Self {
        Self::with_auth(
            AuthConfig {
                method: AuthMethod::None,
                api_key: None,
                api_key_admin: false,
            },
            None,
        )
    }

    /// Fixture with api_key auth. `admin` controls whether key holders get
    /// the admin capability.
    pub fn with_api_key(key: &str, admin: bool) -> Self {
        Self::with_auth(
            AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(key.to_string()),
                api_key_admin: admin,
            },
            Some(key.to_string()),
        )
    }

    fn with_auth(auth: AuthConfig, api_key: Option<String>) -> Self {
        let config = Config {
            auth,
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            orchestrator: OrchestratorConfig {
                max_active_jobs: 2,
                script_language: "JS".to_string(),
            },
            sinks: SinksConfig {
                measurement_service_url: "http://localhost:3008".to_string(),
                metadata_service_url: "http://localhost:3004".to_string(),
                timeout_secs: 5,
            },
        };

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&config.auth).unwrap());

        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        // Mirror production wiring: both stores share one connection, scoped
        // by store id, so file ids are unique across the two stores.
        let config_store_impl =
            Arc::new(SqliteFileStore::in_memory(CAPTURE_CONFIG_STORE).unwrap());
        let script_store: Arc<dyn FileStore> =
            Arc::new(config_store_impl.with_store_id(CAPTURE_SCRIPT_STORE));
        let config_store: Arc<dyn FileStore> = config_store_impl;
        let dispatcher = Arc::new(MockScriptDispatcher::new());
        let measurement_sink = Arc::new(MockMeasurementSink::new());

        // Seed the scripts the fixture capture configs reference
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
            config.orchestrator.clone(),
            job_store,
            Arc::clone(&config_store),
            Arc::clone(&script_store),
            Arc::clone(&dispatcher) as _,
            Arc::clone(&measurement_sink) as _,
            Arc::new(MockMetadataSink::new()),
            JobNotifier::default(),
        ));

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Arc::clone(&orchestrator),
            Arc::clone(&config_store),
            Arc::clone(&script_store),
        ));

        let router = create_router(state);

        Self {
            router,
            orchestrator,
            dispatcher,
            measurement_sink,
            config_store,
            script_store,
            api_key,
        }
    }

    fn request(&self, method: &str, path: &str, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = &self.api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };
        TestResponse { status, body }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(self.request("GET", path, None)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send(self.request("POST", path, Some(body))).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.send(self.request("PUT", path, Some(body))).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(self.request("DELETE", path, None)).await
    }

    /// Wait until the dispatcher has recorded at least `count` requests.
    pub async fn wait_for_requests(&self, count: usize) {
        for _ in 0..200 {
            if self.dispatcher.request_count().await >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {count} script requests, got {}",
            self.dispatcher.request_count().await
        );
    }

    /// Answer the most recent script request with a successful update.
    pub async fn answer_last(&self, output: Value) {
        let request = self.dispatcher.last_request().await.unwrap();
        self.orchestrator
            .handle_script_update(fixtures::ok_update(request.id, output))
            .await;
    }
}
