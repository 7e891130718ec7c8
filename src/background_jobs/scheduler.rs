use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use crate::server::metrics;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How long the loop sleeps when no job is registered.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for each running job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

type RunningSet = Arc<Mutex<HashSet<String>>>;

fn lock_running(running: &RunningSet) -> std::sync::MutexGuard<'_, HashSet<String>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,

    /// Next due time per job.
    next_runs: HashMap<String, Instant>,

    /// Ids of jobs whose execution has not finished yet.
    running: RunningSet,

    /// Task handles of running jobs, reaped by the scheduler loop.
    running_handles: HashMap<String, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running: Arc::new(Mutex::new(HashSet::new())),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            shutdown_token,
        }
    }

    /// Register a job with the scheduler.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());

        let schedule = job.schedule();
        let first_run = if schedule.runs_on_startup() {
            Instant::now()
        } else {
            Instant::now() + schedule.interval()
        };
        self.next_runs.insert(job_id.clone(), first_run);
        self.jobs.insert(job_id, job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_job_running(&self, job_id: &str) -> bool {
        lock_running(&self.running).contains(job_id)
    }

    /// Main scheduler loop, returns once the shutdown token fires.
    pub async fn run(&mut self) {
        info!("Starting job scheduler with {} registered jobs", self.job_count());

        loop {
            self.cleanup_completed_jobs().await;
            self.run_due_jobs();

            let next_due = self
                .next_runs
                .values()
                .min()
                .copied()
                .unwrap_or_else(|| Instant::now() + IDLE_CHECK_INTERVAL);
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                next_due.saturating_duration_since(Instant::now())
            );

            tokio::select! {
                _ = tokio::time::sleep_until(next_due) => {}
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Manually trigger a job by ID, outside its schedule.
    pub fn trigger_job(&mut self, job_id: &str) -> Result<(), JobError> {
        if !self.jobs.contains_key(job_id) {
            return Err(JobError::NotFound);
        }
        if self.is_job_running(job_id) {
            return Err(JobError::AlreadyRunning);
        }
        self.spawn_job(job_id, "manual");
        Ok(())
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .next_runs
            .iter()
            .filter(|(_, next)| **next <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for job_id in due {
            let interval = match self.jobs.get(&job_id) {
                Some(job) => job.schedule().interval(),
                None => continue,
            };
            // Fixed cadence, measured from when the run was due
            self.next_runs.insert(job_id.clone(), now + interval);

            if self.is_job_running(&job_id) {
                debug!("Skipping scheduled run of still running job: {}", job_id);
                continue;
            }
            self.spawn_job(&job_id, "schedule");
        }
    }

    /// Spawn a job execution task.
    fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let Some(job) = self.jobs.get(job_id).map(Arc::clone) else {
            error!("Attempted to spawn unknown job: {}", job_id);
            return;
        };

        debug!("Starting job: {} (triggered_by: {})", job_id, triggered_by);
        lock_running(&self.running).insert(job_id.to_string());

        let cancel_token = self.shutdown_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = JobContext::new(cancel_token);

        let running = Arc::clone(&self.running);
        let job_id_owned = job_id.to_string();

        let handle = tokio::spawn(async move {
            let start_time = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let status_label = match result {
                Ok(Ok(())) => {
                    debug!("Job {} completed in {:?}", job_id_owned, elapsed);
                    "success"
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    "cancelled"
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    "failed"
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    "panic"
                }
            };

            metrics::record_background_job_execution(&job_id_owned, status_label, elapsed);
            lock_running(&running).remove(&job_id_owned);
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    /// Clean up handles for completed jobs.
    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    /// Gracefully shut down the scheduler.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            debug!("Cancelling job: {}", job_id);
            token.cancel();
        }

        for (job_id, handle) in self.running_handles.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                error!("Job {} did not stop within {:?}", job_id, SHUTDOWN_GRACE);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
