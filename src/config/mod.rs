mod file_config;

pub use file_config::{FileConfig, RateLimitFileConfig, RetentionFileConfig};

use crate::download::DEFAULT_MAX_FILE_SIZE;
use crate::rate_limiter::RateLimitConfig;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub output_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_dir: Option<PathBuf>,
    pub extraction_timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            port: 5000,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            frontend_dir_path: None,
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_dir: None,
            extraction_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub output_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Extraction
    pub ytdlp_path: PathBuf,
    pub ffmpeg_dir: Option<PathBuf>,
    pub extraction_timeout: Duration,
    pub max_file_size_bytes: u64,

    // Feature configs (with defaults)
    pub rate_limit: RateLimitConfig,
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSettings {
    pub max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let output_dir = file
            .output_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.output_dir.clone());
        if output_dir.exists() && !output_dir.is_dir() {
            bail!("output_dir is not a directory: {:?}", output_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let ytdlp_path = file
            .ytdlp_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.ytdlp_path.clone());
        let ffmpeg_dir = file
            .ffmpeg_dir
            .map(PathBuf::from)
            .or_else(|| cli.ffmpeg_dir.clone());

        let extraction_timeout_secs = file
            .extraction_timeout_secs
            .unwrap_or(cli.extraction_timeout_secs);
        if extraction_timeout_secs == 0 {
            bail!("extraction_timeout_secs must be greater than zero");
        }

        let max_file_size_bytes = file.max_file_size_bytes.unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if max_file_size_bytes == 0 {
            bail!("max_file_size_bytes must be greater than zero");
        }

        // Rate limit settings - merge file config with defaults
        let rl_file = file.rate_limit.unwrap_or_default();
        let rl_default = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: rl_file.max_requests.unwrap_or(rl_default.max_requests),
            window: rl_file
                .window_secs
                .map(Duration::from_secs)
                .unwrap_or(rl_default.window),
        };
        if rate_limit.max_requests == 0 {
            bail!("rate_limit.max_requests must be greater than zero");
        }
        if rate_limit.window.is_zero() {
            bail!("rate_limit.window_secs must be greater than zero");
        }

        let retention_file = file.retention.unwrap_or_default();
        let retention_default = RetentionSettings::default();
        let retention = RetentionSettings {
            max_age: retention_file
                .max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(retention_default.max_age),
            sweep_interval: retention_file
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(retention_default.sweep_interval),
        };
        if retention.sweep_interval.is_zero() {
            bail!("retention.sweep_interval_secs must be greater than zero");
        }

        Ok(Self {
            output_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            ytdlp_path,
            ffmpeg_dir,
            extraction_timeout: Duration::from_secs(extraction_timeout_secs),
            max_file_size_bytes,
            rate_limit,
            retention,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
