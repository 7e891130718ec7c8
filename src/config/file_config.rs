use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub output_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Extraction
    pub ytdlp_path: Option<String>,
    pub ffmpeg_dir: Option<String>,
    pub extraction_timeout_secs: Option<u64>,
    pub max_file_size_bytes: Option<u64>,

    // Feature configs
    pub rate_limit: Option<RateLimitFileConfig>,
    pub retention: Option<RetentionFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RateLimitFileConfig {
    pub max_requests: Option<u32>,
    pub window_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetentionFileConfig {
    pub max_age_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
