//! Specific background job implementations.

pub mod retention_sweep;

pub use retention_sweep::{RetentionSweepJob, SweepReport};
