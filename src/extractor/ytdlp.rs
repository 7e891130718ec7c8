//! [`MediaExtractor`] backed by the `yt-dlp` command line tool.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::models::PrintedInfo;
use super::{ExtractionPlan, ExtractorError, FinalizedInfo, MediaExtractor, RawInfo};

/// Text yt-dlp prints when `--max-filesize` aborts a download.
const SIZE_LIMIT_MARKER: &str = "File is larger than";

/// Fields printed once the file has been moved to its final location.
const PRINT_TEMPLATE: &str = "after_move:%(.{title,filename,filepath})j";

pub struct YtDlpExtractor {
    binary: PathBuf,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory for the per-run manifest files. Defaults to the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    async fn run(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<Output, ExtractorError> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExtractorError::Spawn)?;

        // Dropping the wait future drops the child, which kills it.
        tokio::select! {
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => {
                match result {
                    Ok(output) => output.map_err(ExtractorError::Spawn),
                    Err(_) => Err(ExtractorError::Timeout(self.timeout)),
                }
            }
            _ = cancel.cancelled() => Err(ExtractorError::Cancelled),
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract_metadata(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RawInfo, ExtractorError> {
        let args = vec![
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            url.to_string(),
        ];

        let output = self.run(&args, cancel).await?;
        if !output.status.success() {
            return Err(ExtractorError::Failed(failure_message(&output)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractorError::InvalidOutput(format!("metadata JSON: {}", e)))
    }

    async fn extract_and_download(
        &self,
        url: &str,
        plan: &ExtractionPlan,
        cancel: &CancellationToken,
    ) -> Result<FinalizedInfo, ExtractorError> {
        let manifest = self
            .scratch_dir
            .join(format!("clipfetch-{}.json", uuid::Uuid::new_v4().simple()));

        let mut args = plan.to_args();
        args.extend([
            "--print-to-file".to_string(),
            PRINT_TEMPLATE.to_string(),
            manifest.to_string_lossy().into_owned(),
            "--".to_string(),
            url.to_string(),
        ]);

        let result = self.run(&args, cancel).await;
        let printed = read_manifest(&manifest).await;
        if let Err(e) = tokio::fs::remove_file(&manifest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove manifest {}: {}", manifest.display(), e);
            }
        }

        let output = result?;
        if reports_size_limit(&output) {
            return Err(ExtractorError::SizeLimitExceeded);
        }
        if !output.status.success() {
            return Err(ExtractorError::Failed(failure_message(&output)));
        }

        let printed = printed.ok_or_else(|| {
            ExtractorError::InvalidOutput("yt-dlp finished without reporting a file".to_string())
        })?;
        finalized_from(printed)
    }
}

async fn read_manifest(path: &Path) -> Option<PrintedInfo> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    content
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .and_then(|l| serde_json::from_str(l).ok())
}

fn finalized_from(printed: PrintedInfo) -> Result<FinalizedInfo, ExtractorError> {
    let PrintedInfo {
        title,
        filename,
        filepath,
    } = printed;
    let filename = filepath.or(filename).ok_or_else(|| {
        ExtractorError::InvalidOutput("yt-dlp reported no filename".to_string())
    })?;

    Ok(FinalizedInfo {
        title: title.unwrap_or_else(|| "download".to_string()),
        filename: PathBuf::from(filename),
    })
}

fn reports_size_limit(output: &Output) -> bool {
    String::from_utf8_lossy(&output.stdout).contains(SIZE_LIMIT_MARKER)
        || String::from_utf8_lossy(&output.stderr).contains(SIZE_LIMIT_MARKER)
}

/// Last `ERROR:` line of stderr, or a trimmed tail of it.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);

    let last_error = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"));

    if let Some(line) = last_error {
        return line.trim_start_matches("ERROR:").trim().to_string();
    }

    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return format!("yt-dlp exited with {}", output.status);
    }
    let tail_start = trimmed
        .char_indices()
        .rev()
        .nth(299)
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[tail_start..].to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::TempDir;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    /// Writes an executable shell script standing in for yt-dlp.
    fn fake_binary(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_failure_message_uses_last_error_line() {
        let out = output(
            1,
            "",
            "WARNING: something\nERROR: first\nERROR: [youtube] abc: Video unavailable\n",
        );
        assert_eq!(failure_message(&out), "[youtube] abc: Video unavailable");
    }

    #[test]
    fn test_failure_message_without_error_line() {
        let out = output(2, "", "");
        assert!(failure_message(&out).starts_with("yt-dlp exited with"));

        let out = output(2, "", "  boom  \n");
        assert_eq!(failure_message(&out), "boom");
    }

    #[test]
    fn test_size_marker_detected_on_either_stream() {
        let on_stdout = output(
            0,
            "[download] File is larger than max-filesize (300 bytes > 100 bytes). Aborting.",
            "",
        );
        assert!(reports_size_limit(&on_stdout));

        let on_stderr = output(1, "", "ERROR: File is larger than max-filesize");
        assert!(reports_size_limit(&on_stderr));

        assert!(!reports_size_limit(&output(1, "", "ERROR: nope")));
    }

    #[test]
    fn test_finalized_prefers_filepath() {
        let printed = PrintedInfo {
            title: Some("Clip".to_string()),
            filename: Some("/out/Clip_x.webm".to_string()),
            filepath: Some("/out/Clip_x.mp3".to_string()),
        };
        let info = finalized_from(printed).unwrap();
        assert_eq!(info.filename, PathBuf::from("/out/Clip_x.mp3"));
        assert_eq!(info.title, "Clip");

        let missing = PrintedInfo {
            title: None,
            filename: None,
            filepath: None,
        };
        assert!(matches!(
            finalized_from(missing),
            Err(ExtractorError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_parses_stdout_json() {
        let dir = TempDir::new().unwrap();
        let script = concat!(
            r#"echo '{"title":"Clip","duration":61,"#,
            r#""formats":[{"format_id":"22","height":720,"vcodec":"avc1"}]}'"#,
        );
        let bin = fake_binary(dir.path(), script);
        let extractor = YtDlpExtractor::new(bin, Duration::from_secs(10));

        let info = extractor
            .extract_metadata("https://example.com/v", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(info.formats[0].height, Some(720));
    }

    #[tokio::test]
    async fn test_metadata_failure_maps_to_failed() {
        let dir = TempDir::new().unwrap();
        let bin = fake_binary(dir.path(), "echo 'ERROR: Unsupported URL: nope' >&2; exit 1");
        let extractor = YtDlpExtractor::new(bin, Duration::from_secs(10));

        let err = extractor
            .extract_metadata("nope", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ExtractorError::Failed(msg) => assert_eq!(msg, "Unsupported URL: nope"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_size_marker_maps_to_size_limit() {
        let dir = TempDir::new().unwrap();
        let bin = fake_binary(
            dir.path(),
            "echo '[download] File is larger than max-filesize (3 bytes > 1 bytes). Aborting.'",
        );
        let extractor =
            YtDlpExtractor::new(bin, Duration::from_secs(10)).with_scratch_dir(dir.path());
        let plan = ExtractionPlan {
            mode: crate::download::DownloadMode::Video,
            target_height: Some(720),
            audio_bitrate: 192,
            output_template: dir.path().join("%(title)s.%(ext)s").to_string_lossy().into_owned(),
            size_ceiling: 1,
            binary_path: dir.path().to_path_buf(),
        };

        let err = extractor
            .extract_and_download("https://example.com/v", &plan, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::SizeLimitExceeded));
    }

    #[tokio::test]
    async fn test_download_reads_manifest() {
        let dir = TempDir::new().unwrap();
        // The manifest path is the argument right before "--"
        let bin = fake_binary(
            dir.path(),
            r#"prev=""
for arg in "$@"; do
  if [ "$arg" = "--" ]; then manifest="$prev"; fi
  prev="$arg"
done
echo '{"title":"Clip","filename":"/out/Clip_x.webm"}' > "$manifest""#,
        );
        let extractor =
            YtDlpExtractor::new(bin, Duration::from_secs(10)).with_scratch_dir(dir.path());
        let plan = ExtractionPlan {
            mode: crate::download::DownloadMode::Audio,
            target_height: None,
            audio_bitrate: 192,
            output_template: "%(title)s.%(ext)s".to_string(),
            size_ceiling: 1024,
            binary_path: dir.path().to_path_buf(),
        };

        let info = extractor
            .extract_and_download("https://example.com/v", &plan, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.title, "Clip");
        assert_eq!(info.filename, PathBuf::from("/out/Clip_x.webm"));

        // Manifest is cleaned up
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("clipfetch-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let bin = fake_binary(dir.path(), "sleep 5");
        let extractor = YtDlpExtractor::new(bin, Duration::from_millis(100));

        let err = extractor
            .extract_metadata("https://example.com/v", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_process() {
        let dir = TempDir::new().unwrap();
        let bin = fake_binary(dir.path(), "sleep 5");
        let extractor = YtDlpExtractor::new(bin, Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = extractor
            .extract_metadata("https://example.com/v", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let extractor = YtDlpExtractor::new("/nonexistent/yt-dlp", Duration::from_secs(1));
        let err = extractor
            .extract_metadata("https://example.com/v", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::Spawn(_)));
    }
}
