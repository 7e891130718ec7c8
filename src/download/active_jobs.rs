use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Ids of jobs currently producing files in the output directory.
///
/// Shared between the orchestrator, which registers jobs, and the retention
/// sweep, which must leave their files alone.
#[derive(Clone, Debug, Default)]
pub struct ActiveJobs {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `job_id` active until the returned guard is dropped.
    pub fn register(&self, job_id: &str) -> ActiveJobGuard {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.to_string());
        ActiveJobGuard {
            jobs: self.clone(),
            job_id: job_id.to_string(),
        }
    }

    /// True if `file_name` belongs to an active job.
    pub fn owns_file(&self, file_name: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|id| file_name.contains(id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ActiveJobGuard {
    jobs: ActiveJobs,
    job_id: String,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.jobs
            .ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_unregisters_on_drop() {
        let jobs = ActiveJobs::new();
        let guard = jobs.register("0123abcd");

        assert_eq!(jobs.len(), 1);
        assert!(jobs.owns_file("Some_title_0123abcd.mp4"));
        assert!(!jobs.owns_file("Other_ffff.mp4"));

        drop(guard);
        assert!(jobs.is_empty());
        assert!(!jobs.owns_file("Some_title_0123abcd.mp4"));
    }

    #[test]
    fn test_clones_share_state() {
        let jobs = ActiveJobs::new();
        let view = jobs.clone();
        let _guard = jobs.register("feed");
        assert!(view.owns_file("x_feed.mp3"));
    }
}
