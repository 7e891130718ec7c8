use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ExtractionPlan, ExtractorError, FinalizedInfo, RawInfo};

/// Resolves URLs to media and produces files on disk.
///
/// Implementations must stop work and return [`ExtractorError::Cancelled`]
/// once `cancel` fires.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Metadata-only lookup, no file is produced.
    async fn extract_metadata(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RawInfo, ExtractorError>;

    /// Extracts and downloads `url` according to `plan`.
    async fn extract_and_download(
        &self,
        url: &str,
        plan: &ExtractionPlan,
        cancel: &CancellationToken,
    ) -> Result<FinalizedInfo, ExtractorError>;
}
