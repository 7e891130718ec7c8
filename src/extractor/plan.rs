//! Typed option set for one extraction run.

use std::path::PathBuf;

use crate::download::DownloadMode;

/// Everything the extractor needs to know to produce one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub mode: DownloadMode,
    /// Upper bound on video height. `None` picks the best available.
    pub target_height: Option<u32>,
    /// Target bitrate in kbps for audio output.
    pub audio_bitrate: u32,
    /// Output template, with `%(title)s` and `%(ext)s` placeholders.
    pub output_template: String,
    /// Maximum allowed size of the produced file in bytes.
    pub size_ceiling: u64,
    /// Directory holding the transcoder binary.
    pub binary_path: PathBuf,
}

impl ExtractionPlan {
    /// Format selector passed to `-f`.
    pub fn format_selector(&self) -> String {
        match self.mode {
            DownloadMode::Audio => "bestaudio/best".to_string(),
            DownloadMode::Video => match self.target_height {
                Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]/best"),
                None => "bestvideo+bestaudio/best".to_string(),
            },
        }
    }

    /// Renders the plan as yt-dlp command line arguments, URL excluded.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.format_selector()];

        match self.mode {
            DownloadMode::Audio => {
                args.extend([
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    "mp3".to_string(),
                    "--audio-quality".to_string(),
                    format!("{}K", self.audio_bitrate),
                    "--embed-thumbnail".to_string(),
                    "--embed-metadata".to_string(),
                ]);
            }
            DownloadMode::Video => {
                args.extend(["--merge-output-format".to_string(), "mp4".to_string()]);
            }
        }

        args.extend([
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--restrict-filenames".to_string(),
            "--no-check-certificates".to_string(),
            "--max-filesize".to_string(),
            self.size_ceiling.to_string(),
            "--ffmpeg-location".to_string(),
            self.binary_path.to_string_lossy().into_owned(),
            "-o".to_string(),
            self.output_template.clone(),
        ]);

        args
    }
}
