//! Background job scheduling and execution system.
//!
//! Periodic maintenance tasks, such as the retention sweep of the output
//! directory, run here independently of request handling.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError, JobSchedule};
pub use scheduler::JobScheduler;
