//! Fake collaborators standing in for yt-dlp and ffmpeg

use super::constants::*;
use async_trait::async_trait;
use clipfetch::download::DownloadMode;
use clipfetch::extractor::{
    ExtractionPlan, ExtractorError, FinalizedInfo, MediaExtractor, RawFormat, RawInfo,
};
use clipfetch::transcoder::TranscoderLocator;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

fn video_format(id: &str, height: u32) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        ext: Some("mp4".to_string()),
        vcodec: Some("avc1".to_string()),
        height: Some(height),
        filesize: Some(height as u64 * 1000),
    }
}

/// Behaves like yt-dlp for the URLs in `constants`.
///
/// Downloads report a `.webm` filename but leave the merged or converted
/// file behind, the way post-processing does.
pub struct FakeExtractor;

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn extract_metadata(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<RawInfo, ExtractorError> {
        if url == BROKEN_URL {
            return Err(ExtractorError::Failed(
                "ERROR: [generic] Unsupported URL".to_string(),
            ));
        }

        Ok(RawInfo {
            title: Some(CLIP_TITLE.to_string()),
            thumbnail: Some("https://media.example.com/thumb.jpg".to_string()),
            uploader: Some("Test Channel".to_string()),
            duration: Some(3725.0),
            formats: vec![
                RawFormat {
                    format_id: "140".to_string(),
                    ext: Some("m4a".to_string()),
                    vcodec: Some("none".to_string()),
                    height: None,
                    filesize: Some(1000),
                },
                video_format("136", 720),
                video_format("137", 1080),
                video_format("248", 1080),
                video_format("135", 480),
            ],
        })
    }

    async fn extract_and_download(
        &self,
        url: &str,
        plan: &ExtractionPlan,
        _cancel: &CancellationToken,
    ) -> Result<FinalizedInfo, ExtractorError> {
        if url == BROKEN_URL {
            return Err(ExtractorError::Failed(
                "ERROR: Video unavailable".to_string(),
            ));
        }
        if url == HUGE_URL {
            return Err(ExtractorError::SizeLimitExceeded);
        }

        let stem = plan.output_template.replace("%(title)s", "Test_Clip");
        let produced_ext = match plan.mode {
            DownloadMode::Audio => "mp3",
            DownloadMode::Video => "mp4",
        };
        let produced = PathBuf::from(stem.replace("%(ext)s", produced_ext));
        tokio::fs::write(&produced, CLIP_BYTES)
            .await
            .map_err(ExtractorError::Spawn)?;

        Ok(FinalizedInfo {
            title: CLIP_TITLE.to_string(),
            filename: PathBuf::from(stem.replace("%(ext)s", "webm")),
        })
    }
}

/// Pretends ffmpeg lives in a fixed directory.
pub struct FixedTranscoderLocator(pub Option<PathBuf>);

impl TranscoderLocator for FixedTranscoderLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}
