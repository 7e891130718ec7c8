use axum::http::StatusCode;
use byte_unit::{Byte, UnitType};
use std::time::Duration;
use thiserror::Error;

use crate::extractor::ExtractorError;

fn human_size(bytes: &u64) -> String {
    Byte::from_u64(*bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

fn window_minutes(window: &Duration) -> u64 {
    (window.as_secs() / 60).max(1)
}

/// Failure of a metadata lookup or download job.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(
        "Rate limit exceeded. You can convert {max_requests} videos every {} minutes.",
        window_minutes(.window)
    )]
    RateLimitExceeded {
        max_requests: u32,
        window: Duration,
        retry_after: Option<Duration>,
    },

    /// Missing host dependency, fatal for the request.
    #[error("{0}")]
    Environment(String),

    #[error("{0}")]
    Extraction(#[source] ExtractorError),

    #[error("File exceeds the {} download limit.", human_size(.limit))]
    SizeLimitExceeded { limit: u64 },

    #[error("download missing: {0}")]
    FileNotFound(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DownloadError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadError::RateLimitExceeded { .. } => "rate_limited",
            DownloadError::Environment(_) => "environment",
            DownloadError::Extraction(_) => "extraction",
            DownloadError::SizeLimitExceeded { .. } => "size_limit",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Cancelled => "cancelled",
            DownloadError::Io(_) => "io",
        }
    }

    /// Maps an extractor failure onto the download taxonomy.
    pub(crate) fn from_extractor(err: ExtractorError, size_ceiling: u64) -> Self {
        match err {
            ExtractorError::SizeLimitExceeded => DownloadError::SizeLimitExceeded {
                limit: size_ceiling,
            },
            ExtractorError::Cancelled => DownloadError::Cancelled,
            other => DownloadError::Extraction(other),
        }
    }
}
