//! Drives the extractor through metadata lookups and download jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::path_resolver::resolve_output_path;
use super::{
    parse_audio_bitrate, parse_target_height, ActiveJobs, DownloadError, DownloadJob, DownloadMode,
    DownloadRequest, JobResult, JobState, Metadata,
};
use crate::extractor::{ExtractionPlan, MediaExtractor};
use crate::formats::{build_catalog, format_duration};
use crate::server::metrics;
use crate::transcoder::TranscoderLocator;

/// Default ceiling on produced files, 2 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

pub struct DownloadOrchestrator {
    extractor: Arc<dyn MediaExtractor>,
    locator: Arc<dyn TranscoderLocator>,
    output_dir: PathBuf,
    size_ceiling: u64,
    active_jobs: ActiveJobs,
}

/// Decrements the active download gauge however the job ends.
struct InFlight;

impl InFlight {
    fn start() -> Self {
        metrics::download_started();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::download_finished();
    }
}

impl DownloadOrchestrator {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        locator: Arc<dyn TranscoderLocator>,
        output_dir: PathBuf,
        size_ceiling: u64,
        active_jobs: ActiveJobs,
    ) -> Self {
        Self {
            extractor,
            locator,
            output_dir,
            size_ceiling,
            active_jobs,
        }
    }

    /// Looks up title, thumbnail, uploader, duration and the format menu.
    pub async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Metadata, DownloadError> {
        let raw = match self.extractor.extract_metadata(url, cancel).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = DownloadError::from_extractor(e, self.size_ceiling);
                metrics::record_metadata_lookup(err.kind());
                return Err(err);
            }
        };
        metrics::record_metadata_lookup("success");

        Ok(Metadata {
            formats: build_catalog(&raw.formats),
            title: raw.title.unwrap_or_default(),
            thumbnail: raw.thumbnail,
            uploader: raw.uploader,
            duration: format_duration(raw.duration),
        })
    }

    /// Builds the extraction plan for `request` writing into this job's slot.
    fn plan_for(
        &self,
        request: &DownloadRequest,
        job: &DownloadJob,
        binary_path: PathBuf,
    ) -> ExtractionPlan {
        let quality = request.quality.as_deref();
        let output_template = self
            .output_dir
            .join(format!("%(title)s_{}.%(ext)s", job.id))
            .to_string_lossy()
            .into_owned();

        ExtractionPlan {
            mode: request.mode,
            target_height: match request.mode {
                DownloadMode::Video => parse_target_height(quality),
                DownloadMode::Audio => None,
            },
            audio_bitrate: parse_audio_bitrate(quality),
            output_template,
            size_ceiling: self.size_ceiling,
            binary_path,
        }
    }

    /// Runs one download job to completion.
    ///
    /// The produced file is left in the output directory; its removal is up
    /// to the retention sweep.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResult, DownloadError> {
        let started = Instant::now();
        let _in_flight = InFlight::start();
        let mut job = DownloadJob::new();

        let result = self.run_job(&mut job, request, cancel).await;
        let mode = request.mode.as_str();

        match &result {
            Ok(done) => {
                job.transition(JobState::Succeeded);
                let file_name = done
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let size_mb = format!("{:.2}", done.size_bytes as f64 / (1024.0 * 1024.0));
                info!(
                    client = %request.client_id,
                    file = %file_name,
                    size_mb = %size_mb,
                    mode,
                    "Download succeeded"
                );
                metrics::record_download(mode, "success", started.elapsed(), done.size_bytes);
            }
            Err(e) => {
                job.transition(JobState::Failed(e.kind()));
                match e {
                    DownloadError::SizeLimitExceeded { .. } => {
                        warn!(
                            client = %request.client_id,
                            url = %request.url,
                            "Download rejected, file too large"
                        );
                    }
                    DownloadError::Cancelled => {
                        info!(
                            client = %request.client_id,
                            url = %request.url,
                            "Download cancelled"
                        );
                    }
                    _ => {
                        error!(
                            client = %request.client_id,
                            url = %request.url,
                            "Download failed: {}",
                            e
                        );
                    }
                }
                metrics::record_download(mode, e.kind(), started.elapsed(), 0);
            }
        }

        result
    }

    async fn run_job(
        &self,
        job: &mut DownloadJob,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResult, DownloadError> {
        job.transition(JobState::Resolving);
        let binary_path = self
            .locator
            .locate()
            .ok_or_else(|| DownloadError::Environment("binary not found".to_string()))?;

        // Registered before anything touches the output directory
        let _active = self.active_jobs.register(&job.id);
        let plan = self.plan_for(request, job, binary_path);

        job.transition(JobState::Downloading);
        let finalized = self
            .extractor
            .extract_and_download(&request.url, &plan, cancel)
            .await
            .map_err(|e| DownloadError::from_extractor(e, self.size_ceiling))?;

        let path = resolve_output_path(&finalized.filename, &self.output_dir, request.mode).await?;
        let size_bytes = tokio::fs::metadata(&path).await?.len();

        Ok(JobResult {
            path,
            title: finalized.title,
            mode: request.mode,
            mime_type: request.mode.mime_type(),
            size_bytes,
        })
    }
}
