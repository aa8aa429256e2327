//! API integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use dpose_analysis::AnalysisConfig;
use dpose_api::{create_router, ApiConfig, AppState};
use dpose_media::{MediaResult, PoseDetector, RawPose, RgbFrame};

const BOUNDARY: &str = "dpose-test-boundary";

/// Detector that never finds anyone.
struct EmptyDetector;

impl PoseDetector for EmptyDetector {
    fn detect(&self, _frame: &RgbFrame) -> MediaResult<Option<RawPose>> {
        Ok(None)
    }
}

fn test_config(upload_dir: &std::path::Path) -> ApiConfig {
    ApiConfig {
        upload_dir: upload_dir.to_path_buf(),
        ..ApiConfig::default()
    }
}

fn router(config: ApiConfig, with_detector: bool) -> Router {
    let detector: Option<Arc<dyn PoseDetector>> = if with_detector {
        Some(Arc::new(EmptyDetector))
    } else {
        None
    };
    let state = AppState::with_detector(config, AnalysisConfig::default(), detector);
    create_router(state, None)
}

fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, file_name, data)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), false);

    for uri in ["/health", "/healthz"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].is_string());
        assert!(body["timestamp"].is_string());
    }
}

/// Readiness fails while the pose model is missing.
#[tokio::test]
async fn test_ready_without_model() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), false);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["pose_model"]["status"], "error");
}

/// Metrics route is only mounted when a recorder is installed.
#[tokio::test]
async fn test_metrics_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), false);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), true);

    let response = app
        .oneshot(upload_request("file", "notes.txt", b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "Unsupported file type");
}

#[tokio::test]
async fn test_missing_file_field() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), true);

    let response = app
        .oneshot(upload_request("video", "dance.mp4", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "No file provided");
}

#[tokio::test]
async fn test_upload_without_model_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), false);

    let response = app
        .oneshot(upload_request("file", "dance.mp4", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// An unreadable video fails the request and the upload is cleaned up.
#[tokio::test]
async fn test_corrupt_video_fails_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), true);

    let response = app
        .oneshot(upload_request("file", "Broken Clip.MP4", b"not a real video"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Analysis failed:"), "detail: {detail}");

    let leftover = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftover, 0);
}

/// A client that gives up while queued for an analysis slot leaves no upload behind.
#[tokio::test]
async fn test_queued_upload_removed_when_client_disconnects() {
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        max_concurrent_analyses: 1,
        ..test_config(dir.path())
    };
    let state = AppState::with_detector(
        config,
        AnalysisConfig::default(),
        Some(Arc::new(EmptyDetector)),
    );
    let busy = state.analysis_slots.clone().try_acquire_owned().unwrap();
    let app = create_router(state, None);

    let queued = tokio::time::timeout(
        Duration::from_millis(200),
        app.oneshot(upload_request("file", "dance.mp4", b"data")),
    )
    .await;
    assert!(queued.is_err(), "request should still be waiting for a slot");

    let leftover: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert!(leftover.is_empty(), "leftover uploads: {leftover:?}");
    drop(busy);
}

/// Test rate limiting on uploads.
#[tokio::test]
async fn test_rate_limiting() {
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        rate_limit_rps: 1,
        ..test_config(dir.path())
    };
    let app = router(config, true);

    let send = |app: Router| async move {
        let mut request = upload_request("file", "notes.txt", b"x");
        request
            .headers_mut()
            .insert("X-Forwarded-For", "192.168.1.100".parse().unwrap());
        app.oneshot(request).await.unwrap()
    };

    let first = send(app.clone()).await;
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = send(app.clone()).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()["Retry-After"], "1");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["X-Request-ID"], "abc-123");
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
}

/// Full run against a real video.
#[tokio::test]
#[ignore = "requires ffmpeg and a sample video at DPOSE_SAMPLE_VIDEO"]
async fn test_analyze_real_video() {
    let Ok(sample) = std::env::var("DPOSE_SAMPLE_VIDEO") else {
        return;
    };
    let data = std::fs::read(&sample).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_config(dir.path()), true);

    let response = app
        .oneshot(upload_request("file", "sample.mp4", &data))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["total_frames"].as_u64().unwrap() > 0);
    assert!(body["sample_frames"].as_array().unwrap().len() <= 5);
    // The detector never finds anyone, so no labels are counted.
    assert!(body["pose_counts"].as_object().unwrap().is_empty());
}
