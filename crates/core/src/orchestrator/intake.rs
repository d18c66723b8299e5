//! Job request intake.
//!
//! Consumes submission requests from a channel and feeds them to the
//! orchestrator. Consumption pauses while the registry is at its ceiling and
//! resumes when a slot frees up, so queued requests are not refused for lack
//! of capacity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::ScriptExecutionUpdate;
use crate::job::CaptureJobRequest;

use super::CaptureOrchestrator;

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct JobIntake {
    orchestrator: Arc<CaptureOrchestrator>,
    paused: Arc<AtomicBool>,
}

impl JobIntake {
    pub fn new(orchestrator: Arc<CaptureOrchestrator>) -> Self {
        let paused = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&paused);
        orchestrator
            .registry()
            .add_observer(Arc::new(move |current, ceiling| {
                flag.store(current >= ceiling, Ordering::SeqCst);
            }));

        Self {
            orchestrator,
            paused,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Spawn the intake loop. It runs until the channel closes or the
    /// shutdown signal fires.
    pub fn spawn(
        self,
        mut requests: mpsc::Receiver<CaptureJobRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Job intake started");
            loop {
                if self.paused.load(Ordering::SeqCst) {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(PAUSE_POLL_INTERVAL) => continue,
                    }
                }

                tokio::select! {
                    _ = shutdown.recv() => break,
                    maybe_request = requests.recv() => {
                        let Some(request) = maybe_request else { break };
                        if let Err(e) = self.orchestrator.submit(request).await {
                            warn!(error = %e, "Intake submission failed");
                        }
                    }
                }
            }
            info!("Job intake stopped");
        })
    }
}

/// Spawn the consumer that feeds inbound script execution updates into the
/// orchestrator.
pub fn spawn_update_consumer(
    orchestrator: Arc<CaptureOrchestrator>,
    mut updates: mpsc::Receiver<ScriptExecutionUpdate>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Script update consumer started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                maybe_update = updates.recv() => {
                    let Some(update) = maybe_update else { break };
                    orchestrator.handle_script_update(update).await;
                }
            }
        }
        info!("Script update consumer stopped");
    })
}
