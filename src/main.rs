use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clipfetch::background_jobs::jobs::RetentionSweepJob;
use clipfetch::background_jobs::JobScheduler;
use clipfetch::config;
use clipfetch::download::{ActiveJobs, DownloadOrchestrator};
use clipfetch::extractor::YtDlpExtractor;
use clipfetch::rate_limiter::SlidingWindowRateLimiter;
use clipfetch::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use clipfetch::transcoder::{SystemTranscoderLocator, TranscoderLocator};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version = env!("GIT_HASH"))]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory finished downloads are written to. Created if missing.
    #[clap(long, value_parser = parse_path, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 5000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// yt-dlp executable, looked up on PATH unless absolute.
    #[clap(long, default_value = "yt-dlp")]
    pub ytdlp_path: PathBuf,

    /// Directory containing ffmpeg. Takes precedence over PATH.
    #[clap(long, value_parser = parse_path)]
    pub ffmpeg_dir: Option<PathBuf>,

    /// Timeout in seconds for a single extractor run.
    #[clap(long, default_value_t = 600)]
    pub extraction_timeout_secs: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            output_dir: args.output_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            ytdlp_path: args.ytdlp_path.clone(),
            ffmpeg_dir: args.ffmpeg_dir.clone(),
            extraction_timeout_secs: args.extraction_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  output_dir: {:?}", app_config.output_dir);
    info!("  ytdlp_path: {:?}", app_config.ytdlp_path);
    info!(
        "  rate_limit: {} requests per {:?}",
        app_config.rate_limit.max_requests, app_config.rate_limit.window
    );
    info!(
        "  retention: max age {:?}, sweep every {:?}",
        app_config.retention.max_age, app_config.retention.sweep_interval
    );

    std::fs::create_dir_all(&app_config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {:?}",
            app_config.output_dir
        )
    })?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let locator = Arc::new(SystemTranscoderLocator::new(app_config.ffmpeg_dir.clone()));
    match locator.locate() {
        Some(dir) => info!("Using ffmpeg from {:?}", dir),
        None => warn!("ffmpeg not found, downloads will fail until it is installed"),
    }

    let extractor = Arc::new(YtDlpExtractor::new(
        app_config.ytdlp_path.clone(),
        app_config.extraction_timeout,
    ));
    let active_jobs = ActiveJobs::new();
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        extractor,
        locator,
        app_config.output_dir.clone(),
        app_config.max_file_size_bytes,
        active_jobs.clone(),
    ));
    let rate_limiter = Arc::new(SlidingWindowRateLimiter::new(app_config.rate_limit.clone()));

    // Set up background job scheduler
    let shutdown_token = CancellationToken::new();
    let mut scheduler = JobScheduler::new(shutdown_token.clone());
    scheduler.register_job(Arc::new(RetentionSweepJob::new(
        app_config.output_dir.clone(),
        app_config.retention.max_age,
        app_config.retention.sweep_interval,
        active_jobs,
    )));
    info!(
        "Job scheduler initialized with {} job(s)",
        scheduler.job_count()
    );

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    // Run HTTP server and job scheduler concurrently
    tokio::select! {
        result = run_server(server_config, orchestrator, rate_limiter) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give running jobs a moment to observe the cancellation
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }
}
