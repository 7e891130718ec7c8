//! Deletes produced files once they outlive the retention window.
//!
//! Every sweep re-scans the output directory; there is no registry of
//! produced files. Files belonging to a job that is still running are left
//! alone. Failures on single entries are logged and retried next sweep.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::download::ActiveJobs;
use crate::server::metrics;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub skipped_active: usize,
    pub skipped_young: usize,
    pub errors: usize,
}

pub struct RetentionSweepJob {
    output_dir: PathBuf,
    max_age: Duration,
    sweep_interval: Duration,
    active_jobs: ActiveJobs,
}

impl RetentionSweepJob {
    pub fn new(
        output_dir: PathBuf,
        max_age: Duration,
        sweep_interval: Duration,
        active_jobs: ActiveJobs,
    ) -> Self {
        Self {
            output_dir,
            max_age,
            sweep_interval,
            active_jobs,
        }
    }

    /// Runs one sweep as if the current time were `now`.
    pub fn sweep_at(&self, now: SystemTime, ctx: &JobContext) -> Result<SweepReport, JobError> {
        self.sweep_with(now, ctx, |path| std::fs::remove_file(path))
    }

    fn sweep_with<F>(
        &self,
        now: SystemTime,
        ctx: &JobContext,
        mut remove: F,
    ) -> Result<SweepReport, JobError>
    where
        F: FnMut(&Path) -> std::io::Result<()>,
    {
        let entries = std::fs::read_dir(&self.output_dir).map_err(|e| {
            JobError::ExecutionFailed(format!(
                "Failed to read output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let mut report = SweepReport::default();

        for entry in entries {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    report.errors += 1;
                    continue;
                }
            };

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to get metadata for {:?}: {}", path, e);
                    report.errors += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            if self.active_jobs.owns_file(&file_name) {
                debug!("Skipping file of running job: {}", file_name);
                report.skipped_active += 1;
                continue;
            }

            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    warn!("Failed to get modified time for {:?}: {}", path, e);
                    report.errors += 1;
                    continue;
                }
            };

            // Modified in the future counts as young
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.max_age {
                report.skipped_young += 1;
                continue;
            }

            match remove(&path) {
                Ok(()) => {
                    info!(
                        file = %file_name,
                        age_secs = age.as_secs(),
                        "Deleted expired file"
                    );
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(file = %file_name, "Failed to delete expired file: {}", e);
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

impl BackgroundJob for RetentionSweepJob {
    fn id(&self) -> &'static str {
        "retention_sweep"
    }

    fn name(&self) -> &'static str {
        "Retention Sweep"
    }

    fn description(&self) -> &'static str {
        "Deletes downloaded files older than the retention window"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::StartupAndInterval(self.sweep_interval)
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let report = self.sweep_at(SystemTime::now(), ctx)?;
        metrics::record_retention_sweep(report.deleted, report.errors);

        if report.deleted > 0 || report.errors > 0 {
            info!(
                scanned = report.scanned,
                deleted = report.deleted,
                skipped_active = report.skipped_active,
                skipped_young = report.skipped_young,
                errors = report.errors,
                "Retention sweep finished"
            );
        }
        Ok(())
    }
}
