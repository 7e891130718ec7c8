use std::time::Duration;
use thiserror::Error;

/// Structured failure kinds reported by a [`MediaExtractor`](super::MediaExtractor).
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The media is bigger than the ceiling the extractor was given.
    #[error("media exceeds the configured size ceiling")]
    SizeLimitExceeded,

    #[error("extraction failed: {0}")]
    Failed(String),

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("extraction cancelled")]
    Cancelled,

    #[error("failed to spawn extractor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid extractor output: {0}")]
    InvalidOutput(String),
}
