//! Locates the file a finished extraction actually produced.
//!
//! Post-processing may rename the extractor's reported file (e.g. a `.webm`
//! becomes an `.mp3`), so the reported name is only a starting point.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DownloadError, DownloadMode};

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Resolves the produced file, trying in order:
/// 1. the reported path with the mode's canonical extension
/// 2. the reported path as is
/// 3. the first file in `output_dir`, by name, matching `{stem}*.{ext}`
pub async fn resolve_output_path(
    reported: &Path,
    output_dir: &Path,
    mode: DownloadMode,
) -> Result<PathBuf, DownloadError> {
    let ext = mode.canonical_extension();

    let canonical = reported.with_extension(ext);
    if is_file(&canonical).await {
        return Ok(canonical);
    }

    if is_file(reported).await {
        debug!("Canonical path missing, using reported {}", reported.display());
        return Ok(reported.to_path_buf());
    }

    let stem = reported
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !stem.is_empty() {
        if let Some(found) = find_by_prefix(output_dir, &stem, ext).await? {
            debug!("Resolved {} by prefix match", found.display());
            return Ok(found);
        }
    }

    Err(DownloadError::FileNotFound(reported.display().to_string()))
}

async fn find_by_prefix(
    dir: &Path,
    stem: &str,
    ext: &str,
) -> Result<Option<PathBuf>, DownloadError> {
    let suffix = format!(".{}", ext);
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut matches = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(stem) && name.ends_with(&suffix) && is_file(&entry.path()).await {
            matches.push(entry.path());
        }
    }

    // read_dir order is platform dependent
    matches.sort();
    Ok(matches.into_iter().next())
}
