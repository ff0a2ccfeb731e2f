mod cleanup;

pub use cleanup::{run_cleanup, CleanupStats};

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::auth::AuthError;
use crate::config::env_string;
use crate::state::AppState;

const DEFAULT_CLEANUP_SCHEDULE: &str = "0 */5 * * * *";

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    state: AppState,
}

impl WorkerManager {
    pub async fn new(state: AppState) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            state,
        })
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        let enabled = std::env::var("ENABLE_CLEANUP_WORKER")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        if !enabled {
            info!("ENABLE_CLEANUP_WORKER is off, skipping worker startup");
            return Ok(());
        }

        let schedule =
            env_string("CLEANUP_SCHEDULE").unwrap_or_else(|| DEFAULT_CLEANUP_SCHEDULE.to_string());
        let state = self.state.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let state = state.clone();
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                let otp = state.otp();
                tokio::select! {
                    _ = rx.recv() => {},
                    result = run_cleanup(state.db(), &otp) => {
                        if let Err(e) = result {
                            error!(error = %e, "Cleanup worker error");
                        }
                    }
                }
            })
        })?;

        let scheduler = self.scheduler.lock().await;
        scheduler.add(job).await?;
        scheduler.start().await?;
        info!(%schedule, "Cleanup worker scheduled");
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Session cleanup error: {0}")]
    Session(#[from] AuthError),
}
