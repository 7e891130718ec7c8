use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::formats::FormatCatalog;

/// Bitrate used when an audio request names none.
pub const DEFAULT_AUDIO_BITRATE: u32 = 192;

lazy_static! {
    static ref HEIGHT_SELECTOR: Regex = Regex::new(r"^\s*(\d+)\s*[A-Za-z]*\s*$").unwrap();
    static ref BITRATE_SELECTOR: Regex = Regex::new(r"(?i)^\s*(\d+)\s*(k|kbps)?\s*$").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    Audio,
    Video,
}

impl DownloadMode {
    pub fn canonical_extension(&self) -> &'static str {
        match self {
            DownloadMode::Audio => "mp3",
            DownloadMode::Video => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DownloadMode::Audio => "audio/mpeg",
            DownloadMode::Video => "video/mp4",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMode::Audio => "audio",
            DownloadMode::Video => "video",
        }
    }
}

/// Anything that is not `audio` is treated as a video request.
impl From<&str> for DownloadMode {
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("audio") {
            DownloadMode::Audio
        } else {
            DownloadMode::Video
        }
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Height ceiling from a selector such as `"720p"` or `"1080"`.
///
/// Missing or unparseable selectors mean no ceiling.
pub fn parse_target_height(quality: Option<&str>) -> Option<u32> {
    let captures = HEIGHT_SELECTOR.captures(quality?)?;
    captures[1].parse::<u32>().ok().filter(|h| *h > 0)
}

/// Bitrate in kbps from a selector such as `"320"` or `"128k"`.
pub fn parse_audio_bitrate(quality: Option<&str>) -> u32 {
    quality
        .and_then(|q| BITRATE_SELECTOR.captures(q))
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|b| *b > 0)
        .unwrap_or(DEFAULT_AUDIO_BITRATE)
}

/// Input of one download job.
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    pub url: String,
    pub mode: DownloadMode,
    pub quality: Option<String>,
    /// Identity the job is billed to, used for logging
    pub client_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Created,
    Resolving,
    Downloading,
    Succeeded,
    Failed(&'static str),
}

/// Lifecycle of a single download, alive only for one orchestrator call.
#[derive(Debug)]
pub struct DownloadJob {
    pub id: String,
    state: JobState,
}

impl DownloadJob {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            state: JobState::Created,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn transition(&mut self, next: JobState) {
        debug!("Job {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

impl Default for DownloadJob {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished download. The file belongs to the output directory from now on.
#[derive(Clone, Debug)]
pub struct JobResult {
    pub path: PathBuf,
    pub title: String,
    pub mode: DownloadMode,
    pub mime_type: &'static str,
    pub size_bytes: u64,
}

impl JobResult {
    /// Name offered to the client, `{title}.{mp3|mp4}`.
    pub fn download_name(&self) -> String {
        format!("{}.{}", self.title, self.mode.canonical_extension())
    }
}

/// Metadata returned by a lookup.
#[derive(Clone, Debug, Serialize)]
pub struct Metadata {
    pub title: String,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub duration: String,
    pub formats: FormatCatalog,
}
