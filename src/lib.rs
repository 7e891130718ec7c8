//! clipfetch: media download server library
//!
//! Exposes the internal modules for the binary and the integration tests.

pub mod background_jobs;
pub mod config;
pub mod download;
pub mod extractor;
pub mod formats;
pub mod rate_limiter;
pub mod server;
pub mod transcoder;

pub use download::{DownloadOrchestrator, DownloadRequest, JobResult};
pub use rate_limiter::SlidingWindowRateLimiter;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
