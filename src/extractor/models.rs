//! Models for the JSON emitted by the extraction tool.

use serde::Deserialize;
use std::path::PathBuf;

/// Metadata for a single URL as reported by the extractor.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Duration in seconds, fractional for some sites
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One entry of the extractor's format list.
///
/// Audio-only entries carry `vcodec == "none"` and no height.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

impl RawFormat {
    pub fn has_video(&self) -> bool {
        !matches!(self.vcodec.as_deref(), Some("none"))
    }
}

/// What the extractor reports after a finished download.
#[derive(Clone, Debug)]
pub struct FinalizedInfo {
    pub title: String,
    /// Filename the extractor prepared, before any post-processing renamed it
    pub filename: PathBuf,
}

/// Line written by `--print-to-file` once the download finished.
#[derive(Debug, Deserialize)]
pub(crate) struct PrintedInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
}
