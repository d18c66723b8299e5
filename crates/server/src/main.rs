use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use platecap_core::bridge::{ChannelDispatcher, ScriptExecutionRequest};
use platecap_core::filestore::{
    FileStore, SqliteFileStore, CAPTURE_CONFIG_STORE, CAPTURE_SCRIPT_STORE,
};
use platecap_core::job::{JobStore, SqliteJobStore};
use platecap_core::notify::JobNotifier;
use platecap_core::orchestrator::{spawn_update_consumer, CaptureOrchestrator, JobIntake};
use platecap_core::sink::{HttpMeasurementSink, HttpMetadataSink, MeasurementSink, MetadataSink};
use platecap_core::{create_authenticator, load_config, validate_config, Authenticator};

use platecap_server::api::create_router;
use platecap_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the bridge and intake channels
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PLATECAP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    // Compute config hash so startup logs identify the active configuration
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Starting platecap"
    );

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite job store
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Create the capture config and script stores, sharing one connection
    let config_store = Arc::new(
        SqliteFileStore::open(&config.database.path, CAPTURE_CONFIG_STORE)
            .context("Failed to create file store")?,
    );
    let script_store: Arc<dyn FileStore> =
        Arc::new(config_store.with_store_id(CAPTURE_SCRIPT_STORE));
    let config_store: Arc<dyn FileStore> = config_store;
    info!("Capture config and script stores initialized");

    // Downstream sinks
    let measurement_sink: Arc<dyn MeasurementSink> =
        Arc::new(HttpMeasurementSink::new(&config.sinks));
    let metadata_sink: Arc<dyn MetadataSink> = Arc::new(HttpMetadataSink::new(&config.sinks));
    info!(
        measurement_service = %config.sinks.measurement_service_url,
        metadata_service = %config.sinks.metadata_service_url,
        "Downstream sinks initialized"
    );

    // Bridge and intake channels. The far ends of these channels are the
    // integration seam for the script execution transport and the external
    // job feed.
    let (script_tx, script_rx) = mpsc::channel::<ScriptExecutionRequest>(CHANNEL_BUFFER_SIZE);
    let (update_tx, update_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let (request_tx, request_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let dispatcher = Arc::new(ChannelDispatcher::new(script_tx));
    let notifier = JobNotifier::default();

    // Create the capture orchestrator
    let orchestrator = Arc::new(CaptureOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&job_store),
        Arc::clone(&config_store),
        Arc::clone(&script_store),
        dispatcher,
        measurement_sink,
        metadata_sink,
        notifier,
    ));
    info!(
        max_active_jobs = config.orchestrator.max_active_jobs,
        script_language = %config.orchestrator.script_language,
        "Capture orchestrator initialized"
    );

    // Spawn the inbound script update consumer and the job request intake
    let update_task =
        spawn_update_consumer(Arc::clone(&orchestrator), update_rx, shutdown_tx.subscribe());
    let intake_task =
        JobIntake::new(Arc::clone(&orchestrator)).spawn(request_rx, shutdown_tx.subscribe());

    // Drain outbound script requests until a transport is attached. The
    // update sender is parked here with it so the consumer stays alive.
    let bridge_task = tokio::spawn(drain_script_requests(
        script_rx,
        update_tx,
        shutdown_tx.subscribe(),
    ));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        Arc::clone(&orchestrator),
        config_store,
        script_store,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // Stop the background consumers and wait for them to drain
    let _ = shutdown_tx.send(());
    let _ = update_task.await;
    let _ = intake_task.await;
    let _ = bridge_task.await;
    drop(request_tx);
    info!("Background tasks stopped");

    Ok(())
}

/// Consume outbound script execution requests in lieu of a real transport.
///
/// Deployments embed this binary next to a broker client that forwards
/// requests to the script execution service and feeds its updates back
/// through the update channel; without one, requests are logged and dropped.
async fn drain_script_requests(
    mut requests: mpsc::Receiver<ScriptExecutionRequest>,
    _update_tx: mpsc::Sender<platecap_core::bridge::ScriptExecutionUpdate>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            maybe_request = requests.recv() => {
                let Some(request) = maybe_request else { break };
                debug!(
                    request_id = %request.id,
                    language = %request.language,
                    "No script execution transport attached; request dropped"
                );
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
