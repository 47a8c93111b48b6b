mod engagement;
mod session_cleanup;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::env_bool;
use crate::db::DatabaseProxy;

pub use engagement::run_engagement_rollup;

const DEFAULT_ENGAGEMENT_SCHEDULE: &str = "0 55 23 * * *";
const DEFAULT_SESSION_CLEANUP_SCHEDULE: &str = "0 0 * * * *";

fn schedule_from_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

static WORKER_LEADER: AtomicBool = AtomicBool::new(false);

pub fn is_worker_leader() -> bool {
    WORKER_LEADER.load(Ordering::Relaxed)
}

fn set_worker_leader(val: bool) {
    WORKER_LEADER.store(val, Ordering::Relaxed);
}

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    db_proxy: Arc<DatabaseProxy>,
}

impl WorkerManager {
    pub async fn new(db_proxy: Arc<DatabaseProxy>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            db_proxy,
        })
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !env_bool("WORKER_LEADER").unwrap_or(false) {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        set_worker_leader(true);
        info!("Starting workers (leader mode)");

        let scheduler = self.scheduler.lock().await;

        if env_bool("ENABLE_ENGAGEMENT_WORKER").unwrap_or(true) {
            let schedule = schedule_from_env("ENGAGEMENT_SCHEDULE", DEFAULT_ENGAGEMENT_SCHEDULE);
            let job = self.cron_job("engagement", &schedule, |db| async move {
                engagement::run_engagement_rollup(db, None).await.map(|_| ())
            })?;
            scheduler.add(job).await?;
            info!(schedule = %schedule, "Engagement worker scheduled");
        }

        if env_bool("ENABLE_SESSION_CLEANUP_WORKER").unwrap_or(true) {
            let schedule =
                schedule_from_env("SESSION_CLEANUP_SCHEDULE", DEFAULT_SESSION_CLEANUP_SCHEDULE);
            let job = self.cron_job(
                "session cleanup",
                &schedule,
                session_cleanup::cleanup_expired_sessions,
            )?;
            scheduler.add(job).await?;
            info!(schedule = %schedule, "Session cleanup worker scheduled");
        }

        scheduler.start().await?;
        info!("All workers started");

        Ok(())
    }

    /// Wraps `task` in a cron job that is abandoned once shutdown is broadcast.
    fn cron_job<F, Fut>(
        &self,
        name: &'static str,
        schedule: &str,
        task: F,
    ) -> Result<Job, WorkerError>
    where
        F: Fn(Arc<DatabaseProxy>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let db = Arc::clone(&self.db_proxy);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let db = Arc::clone(&db);
            let task = task.clone();
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                tokio::select! {
                    _ = rx.recv() => {},
                    result = task(db) => {
                        if let Err(e) = result {
                            error!(worker = name, error = %e, "Worker run failed");
                        }
                    }
                }
            })
        })?;
        Ok(job)
    }

    pub async fn stop(&self) {
        if !is_worker_leader() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        set_worker_leader(false);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
