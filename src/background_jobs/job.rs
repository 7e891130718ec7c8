use super::context::JobContext;
use std::time::Duration;
use thiserror::Error;

/// Schedule for when a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run at fixed intervals, the first run one interval after startup
    Interval(Duration),
    /// Run once at startup, then at fixed intervals
    StartupAndInterval(Duration),
}

impl JobSchedule {
    pub fn interval(&self) -> Duration {
        match self {
            JobSchedule::Interval(d) | JobSchedule::StartupAndInterval(d) => *d,
        }
    }

    pub fn runs_on_startup(&self) -> bool {
        matches!(self, JobSchedule::StartupAndInterval(_))
    }
}

/// Errors that can occur during job execution.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,

    #[error("Job is already running")]
    AlreadyRunning,

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job was cancelled")]
    Cancelled,
}

/// Trait for background jobs.
///
/// Jobs are executed synchronously in a blocking context.
/// Long-running work should check for cancellation between steps.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// When this job should be scheduled to run.
    fn schedule(&self) -> JobSchedule;

    /// Execute the job.
    ///
    /// Called from `spawn_blocking`. Implementations should check
    /// `ctx.is_cancelled()` during long loops and return
    /// `JobError::Cancelled` early.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_interval_and_startup() {
        let every_minute = Duration::from_secs(60);

        assert_eq!(JobSchedule::Interval(every_minute).interval(), every_minute);
        assert!(!JobSchedule::Interval(every_minute).runs_on_startup());
        assert!(JobSchedule::StartupAndInterval(every_minute).runs_on_startup());
    }

    #[test]
    fn test_job_error_display() {
        assert_eq!(
            JobError::ExecutionFailed("disk gone".to_string()).to_string(),
            "Execution failed: disk gone"
        );
        assert_eq!(JobError::Cancelled.to_string(), "Job was cancelled");
    }
}
