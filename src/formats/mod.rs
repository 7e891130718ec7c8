//! Format menu shown to clients before they pick a download quality.
//!
//! Video options are derived from the extractor's raw format list; audio
//! options are a fixed ladder since every audio download is re-encoded.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

use crate::extractor::RawFormat;

/// One selectable video resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub id: String,
    /// Display label, e.g. `"1080p"`
    pub resolution: String,
    pub ext: String,
    pub filesize: Option<u64>,
    #[serde(skip)]
    pub height: u32,
}

/// Fixed audio bitrates offered for mp3 output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioTier {
    High,
    Standard,
    DataSaver,
}

impl AudioTier {
    pub const ALL: [AudioTier; 3] = [AudioTier::High, AudioTier::Standard, AudioTier::DataSaver];

    pub fn bitrate(&self) -> u32 {
        match self {
            AudioTier::High => 320,
            AudioTier::Standard => 192,
            AudioTier::DataSaver => 128,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AudioTier::High => "High Quality (320kbps)",
            AudioTier::Standard => "Standard (192kbps)",
            AudioTier::DataSaver => "Data Saver (128kbps)",
        }
    }
}

impl Serialize for AudioTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("AudioTier", 3)?;
        s.serialize_field("id", &self.bitrate().to_string())?;
        s.serialize_field("label", self.label())?;
        s.serialize_field("bitrate", &self.bitrate())?;
        s.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormatCatalog {
    pub video: Vec<FormatOption>,
    pub audio: Vec<AudioTier>,
}

/// Builds the format menu from raw extractor formats.
///
/// Entries without a video stream or a usable height are skipped. The first
/// entry seen for a resolution wins. Output is sorted by height, highest first.
pub fn build_catalog(raw_formats: &[RawFormat]) -> FormatCatalog {
    let mut seen = HashSet::new();
    let mut video = Vec::new();

    for raw in raw_formats {
        if !raw.has_video() {
            continue;
        }
        let Some(height) = raw.height.filter(|h| *h > 0) else {
            continue;
        };
        if !seen.insert(height) {
            continue;
        }

        video.push(FormatOption {
            id: raw.format_id.clone(),
            resolution: format!("{}p", height),
            ext: raw.ext.clone().unwrap_or_else(|| "mp4".to_string()),
            filesize: raw.filesize,
            height,
        });
    }

    // Stable, though heights are unique by now
    video.sort_by(|a, b| b.height.cmp(&a.height));

    FormatCatalog {
        video,
        audio: AudioTier::ALL.to_vec(),
    }
}

/// Renders a duration in seconds as `MM:SS`, or `HH:MM:SS` past one hour.
///
/// Missing or negative durations render as `00:00`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s as u64,
        _ => return "00:00".to_string(),
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
