//! Lookup of the ffmpeg binary the extractor needs for post-processing.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds the directory holding the transcoder binary.
pub trait TranscoderLocator: Send + Sync {
    fn locate(&self) -> Option<PathBuf>;
}

/// Checks a configured directory first, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemTranscoderLocator {
    preferred_dir: Option<PathBuf>,
}

impl SystemTranscoderLocator {
    pub fn new(preferred_dir: Option<PathBuf>) -> Self {
        Self { preferred_dir }
    }
}

fn contains_ffmpeg(dir: &Path) -> bool {
    dir.join("ffmpeg").is_file() || dir.join("ffmpeg.exe").is_file()
}

impl TranscoderLocator for SystemTranscoderLocator {
    fn locate(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.preferred_dir {
            if contains_ffmpeg(dir) {
                return Some(dir.clone());
            }
            debug!("No ffmpeg in configured dir {}, falling back to PATH", dir.display());
        }

        which::which("ffmpeg")
            .ok()
            .and_then(|bin| bin.parent().map(Path::to_path_buf))
    }
}
