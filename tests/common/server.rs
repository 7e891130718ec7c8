//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own output directory.

use super::constants::*;
use super::fixtures::{FakeExtractor, FixedTranscoderLocator};
use clipfetch::download::{ActiveJobs, DownloadOrchestrator};
use clipfetch::rate_limiter::{RateLimitConfig, SlidingWindowRateLimiter};
use clipfetch::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance backed by fake collaborators
///
/// When dropped, the server shuts down and the output directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Shared limiter, for asserting on quota usage
    pub rate_limiter: Arc<SlidingWindowRateLimiter>,

    output_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with the default rate limit on a random port
    pub async fn spawn() -> Self {
        Self::spawn_with(RateLimitConfig::default(), Some(PathBuf::from("/usr/bin"))).await
    }

    /// Spawns a server with a custom rate limit and ffmpeg location
    pub async fn spawn_with(rate_limit: RateLimitConfig, ffmpeg_dir: Option<PathBuf>) -> Self {
        let output_dir = TempDir::new().expect("Failed to create output dir");

        let orchestrator = Arc::new(DownloadOrchestrator::new(
            Arc::new(FakeExtractor),
            Arc::new(FixedTranscoderLocator(ffmpeg_dir)),
            output_dir.path().to_path_buf(),
            1024 * 1024,
            ActiveJobs::new(),
        ));
        let rate_limiter = Arc::new(SlidingWindowRateLimiter::new(rate_limit));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };
        let app = make_app(ServerState::new(
            config,
            orchestrator,
            rate_limiter.clone(),
        ));

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            rate_limiter,
            output_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir.path()
    }

    /// Names of the files currently in the output directory
    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output_dir.path())
            .expect("Failed to list output dir")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Polls `/` until the server answers
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}
