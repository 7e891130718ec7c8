use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all clipfetch metrics
const PREFIX: &str = "clipfetch";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Download Metrics
    pub static ref DOWNLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_downloads_total"), "Download jobs by mode and outcome"),
        &["mode", "outcome"]
    ).expect("Failed to create downloads_total metric");

    pub static ref DOWNLOAD_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_download_duration_seconds"),
            "Time spent producing a download"
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["mode"]
    ).expect("Failed to create download_duration_seconds metric");

    pub static ref DOWNLOAD_BYTES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_download_bytes_total"), "Bytes of produced files"),
        &["mode"]
    ).expect("Failed to create download_bytes_total metric");

    pub static ref ACTIVE_DOWNLOADS: Gauge = Gauge::new(
        format!("{PREFIX}_active_downloads"),
        "Download jobs currently running"
    ).expect("Failed to create active_downloads metric");

    pub static ref METADATA_LOOKUPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_metadata_lookups_total"), "Metadata lookups by outcome"),
        &["outcome"]
    ).expect("Failed to create metadata_lookups_total metric");

    // Rate Limiting Metrics
    pub static ref RATE_LIMIT_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_rate_limit_hits_total"), "Rate limit rejections"),
        &["endpoint"]
    ).expect("Failed to create rate_limit_hits_total metric");

    // Retention Metrics
    pub static ref RETENTION_FILES_DELETED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_retention_files_deleted_total"),
        "Files removed by the retention sweep"
    ).expect("Failed to create retention_files_deleted_total metric");

    pub static ref RETENTION_ERRORS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_retention_errors_total"),
        "Entries the retention sweep failed to inspect or delete"
    ).expect("Failed to create retention_errors_total metric");

    // Background Job Metrics
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Background job runs"),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job run duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOAD_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOAD_BYTES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_DOWNLOADS.clone()));
    let _ = REGISTRY.register(Box::new(METADATA_LOOKUPS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RATE_LIMIT_HITS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RETENTION_FILES_DELETED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RETENTION_ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Collapses request paths into a fixed label set.
pub fn categorize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/api/get-info" => "/api/get-info",
        "/download" => "/download",
        _ => "other",
    }
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = categorize_endpoint(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a finished download job
pub fn record_download(mode: &str, outcome: &str, duration: Duration, bytes: u64) {
    DOWNLOADS_TOTAL.with_label_values(&[mode, outcome]).inc();
    DOWNLOAD_DURATION_SECONDS
        .with_label_values(&[mode])
        .observe(duration.as_secs_f64());
    if bytes > 0 {
        DOWNLOAD_BYTES_TOTAL.with_label_values(&[mode]).inc_by(bytes);
    }
}

pub fn download_started() {
    ACTIVE_DOWNLOADS.inc();
}

pub fn download_finished() {
    ACTIVE_DOWNLOADS.dec();
}

pub fn record_metadata_lookup(outcome: &str) {
    METADATA_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_rate_limit_hit(endpoint: &str) {
    RATE_LIMIT_HITS_TOTAL.with_label_values(&[endpoint]).inc();
}

pub fn record_retention_sweep(deleted: usize, errors: usize) {
    RETENTION_FILES_DELETED_TOTAL.inc_by(deleted as u64);
    RETENTION_ERRORS_TOTAL.inc_by(errors as u64);
}

pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
