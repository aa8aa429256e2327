//! Video upload and analysis handler.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{info, warn};
use uuid::Uuid;

use dpose_analysis::{Analyzer, CancellationFlag};
use dpose_media::FfmpegDecoder;
use dpose_models::VideoSummary;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Accepted upload extensions (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Multipart field carrying the video.
const FILE_FIELD: &str = "file";

/// Check whether a file name has a supported video extension.
pub fn is_supported_video(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// Remove an uploaded file, logging instead of failing.
fn remove_upload(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        // The write never created it.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
    }
}

/// Analyze an uploaded video.
///
/// Expects a multipart form with the video in the `file` field.
pub async fn analyze_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<VideoSummary>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !is_supported_video(&file_name) {
            return Err(ApiError::bad_request("Unsupported file type"));
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let detector = state
        .detector
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Pose model not loaded"))?;

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {e}")))?;

    let path: PathBuf = state.config.upload_dir.join(format!(
        "{}_{}",
        Uuid::new_v4(),
        sanitize_file_name(&file_name)
    ));
    // Removes the upload however this request ends, including a client
    // disconnect while it waits for an analysis slot.
    let upload = scopeguard::guard(path, |path| remove_upload(&path));

    tokio::fs::write(&*upload, &data)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to save upload: {e}")))?;

    info!(
        file_name = %file_name,
        bytes = data.len(),
        path = %upload.display(),
        "Video uploaded"
    );

    let permit = state
        .analysis_slots
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::service_unavailable("Analysis capacity closed"))?;

    // Stops the blocking run if this request is dropped mid-analysis.
    let cancellation = CancellationFlag::new();
    let _cancel_on_drop = scopeguard::guard(cancellation.clone(), |flag| flag.cancel());

    let analysis = state.analysis.clone();
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let analyzer = Analyzer::new(FfmpegDecoder::new(), detector, analysis)
            .with_cancellation(cancellation);
        analyzer.analyze(&upload)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Analysis task failed: {e}")))?;

    let duration = start.elapsed().as_secs_f64();
    match result {
        Ok(output) => {
            metrics::record_analysis(if output.timed_out { "timeout" } else { "success" }, duration);
            metrics::record_summary(&output.summary);
            Ok(Json(output.summary))
        }
        Err(e) => {
            warn!(file_name = %file_name, error = %e, "Analysis failed");
            metrics::record_analysis(e.kind(), duration);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_video("dance.mp4"));
        assert!(is_supported_video("DANCE.MOV"));
        assert!(is_supported_video("clip.final.mkv"));
        assert!(is_supported_video("a.avi"));
        assert!(!is_supported_video("notes.txt"));
        assert!(!is_supported_video("mp4"));
        assert!(!is_supported_video(""));
    }

    #[test]
    fn test_remove_upload_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        remove_upload(&path);

        std::fs::write(&path, b"data").unwrap();
        remove_upload(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my dance.mp4"), "my_dance.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd.mp4"), "passwd.mp4");
        assert_eq!(sanitize_file_name(""), "upload");
    }
}
