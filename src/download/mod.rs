//! Download jobs: quality selection, size enforcement and output path
//! resolution on top of a [`MediaExtractor`](crate::extractor::MediaExtractor).

mod active_jobs;
mod errors;
mod models;
mod orchestrator;
mod path_resolver;

pub use active_jobs::{ActiveJobGuard, ActiveJobs};
pub use errors::DownloadError;
pub use models::{
    parse_audio_bitrate, parse_target_height, DownloadJob, DownloadMode, DownloadRequest,
    JobResult, JobState, Metadata, DEFAULT_AUDIO_BITRATE,
};
pub use orchestrator::{DownloadOrchestrator, DEFAULT_MAX_FILE_SIZE};
pub use path_resolver::resolve_output_path;
