//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{get_job_status, health, process_video, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/process", post(process_video))
        .route("/job/:job_id", get(get_job_status));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(job_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .nest_service("/processed", ServeDir::new(&state.config.processed_dir))
        // Uploads are bounded by MAX_UPLOAD_SIZE rather than axum's 2MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use vidiox_models::{JobStatus, TranscodeJob};
    use vidiox_queue::{JobStatusTracker, MemoryStatusStore, QueueError, QueueResult};
    use vidiox_storage::LocalPublisher;

    use crate::config::ApiConfig;
    use crate::state::JobSubmitter;

    const BOUNDARY: &str = "vidiox-test-boundary";

    #[derive(Default)]
    struct FakeQueue {
        full: bool,
        submitted: Mutex<Vec<TranscodeJob>>,
        refused: Mutex<Vec<TranscodeJob>>,
    }

    #[async_trait]
    impl JobSubmitter for FakeQueue {
        async fn submit(&self, job: &TranscodeJob) -> QueueResult<String> {
            if self.full {
                self.refused.lock().unwrap().push(job.clone());
                return Err(QueueError::QueueFull { pending: 1, max: 1 });
            }
            self.submitted.lock().unwrap().push(job.clone());
            Ok("1-0".to_string())
        }

        async fn ping(&self) -> QueueResult<()> {
            Ok(())
        }
    }

    struct TestApp {
        dir: tempfile::TempDir,
        queue: Arc<FakeQueue>,
        tracker: JobStatusTracker,
        router: Router,
    }

    fn test_app(queue: FakeQueue, tracker: JobStatusTracker) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            upload_dir: dir.path().join("uploads"),
            processed_dir: dir.path().join("processed"),
            max_upload_size: 1024 * 1024,
            ..ApiConfig::default()
        };
        let queue = Arc::new(queue);
        let state = AppState::new(
            config,
            queue.clone(),
            tracker.clone(),
            Arc::new(LocalPublisher::new("http://localhost:5000")),
        );

        TestApp {
            dir,
            queue,
            tracker,
            router: create_router(state, None),
        }
    }

    fn tracked_app(queue: FakeQueue) -> TestApp {
        test_app(queue, JobStatusTracker::new(Arc::new(MemoryStatusStore::new())))
    }

    fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/process")
            .header("content-length", body.len())
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(router, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn files_in(dir: &Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = tracked_app(FakeQueue::default());
        let (status, body) = send_json(&app.router, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "video-processor");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_process_accepts_upload() {
        let app = tracked_app(FakeQueue::default());
        let (status, body) = send_json(
            &app.router,
            multipart_request("video", "My Trip.MP4", b"fake video bytes"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert_eq!(body["message"], "Video processing job started");

        let video_id = body["video_id"].as_str().unwrap();
        let stored = app
            .dir
            .path()
            .join("uploads")
            .join(format!("{video_id}_original.mp4"));
        assert_eq!(std::fs::read(&stored).unwrap(), b"fake video bytes");

        let submitted = app.queue.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].original_filename, "My_Trip.MP4");
        assert_eq!(submitted[0].input_path, stored);

        let job_id = body["job_id"].as_str().unwrap();
        let view = app.tracker.get_status(job_id).await.unwrap();
        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.video_id.as_deref(), Some(video_id));
    }

    #[tokio::test]
    async fn test_process_requires_video_field() {
        let app = tracked_app(FakeQueue::default());
        let (status, body) =
            send_json(&app.router, multipart_request("file", "clip.mp4", b"x")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No video file provided");
    }

    #[tokio::test]
    async fn test_process_rejects_bad_extension() {
        let app = tracked_app(FakeQueue::default());
        let (status, body) =
            send_json(&app.router, multipart_request("video", "notes.txt", b"x")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid file");
        assert!(files_in(&app.dir.path().join("uploads")).is_empty());
        assert!(app.queue.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_rejects_empty_filename() {
        let app = tracked_app(FakeQueue::default());
        let (status, body) = send_json(&app.router, multipart_request("video", "", b"x")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid file");
    }

    #[tokio::test]
    async fn test_full_queue_refuses_and_keeps_upload() {
        let app = tracked_app(FakeQueue {
            full: true,
            ..FakeQueue::default()
        });
        let (status, body) =
            send_json(&app.router, multipart_request("video", "clip.webm", b"x")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Job queue is full, try again later");

        let refused = app.queue.refused.lock().unwrap().clone();
        assert_eq!(refused.len(), 1);
        assert!(refused[0].input_path().exists());

        let view = app
            .tracker
            .get_status(refused[0].job_id.as_str())
            .await
            .unwrap();
        assert_eq!(view.status, JobStatus::Error);
        assert!(view.message.starts_with("Unexpected error: job could not be queued"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_refused() {
        let app = tracked_app(FakeQueue::default());
        let big = vec![0u8; 2 * 1024 * 1024];
        let (status, _) = send(&app.router, multipart_request("video", "big.mp4", &big)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.queue.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_status_lookup() {
        let app = tracked_app(FakeQueue::default());
        let (_, accepted) =
            send_json(&app.router, multipart_request("video", "a.mov", b"x")).await;
        let job_id = accepted["job_id"].as_str().unwrap();

        let (status, body) = send_json(&app.router, get_request(&format!("/job/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert_eq!(body["original_filename"], "a.mov");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = tracked_app(FakeQueue::default());

        let (status, body) = send_json(
            &app.router,
            get_request("/job/00000000-0000-4000-8000-000000000000"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Job not found");

        let (status, _) = send_json(&app.router, get_request("/job/not-a-job")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_job_status_without_tracking() {
        let app = test_app(FakeQueue::default(), JobStatusTracker::disabled());

        let (status, body) = send_json(
            &app.router,
            get_request("/job/00000000-0000-4000-8000-000000000000"),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Job tracking not available");
    }

    #[tokio::test]
    async fn test_uploads_still_accepted_without_tracking() {
        let app = test_app(FakeQueue::default(), JobStatusTracker::disabled());
        let (status, _) =
            send_json(&app.router, multipart_request("video", "a.mkv", b"x")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.queue.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_processed_files_are_served() {
        let app = tracked_app(FakeQueue::default());
        let processed = app.dir.path().join("processed");
        std::fs::create_dir_all(&processed).unwrap();
        std::fs::write(processed.join("vid_240p.mp4"), b"rendition").unwrap();

        let (status, body) = send(&app.router, get_request("/processed/vid_240p.mp4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"rendition");

        let (status, _) = send(&app.router, get_request("/processed/missing.mp4")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ready_reports_degraded_tracking() {
        let app = test_app(FakeQueue::default(), JobStatusTracker::disabled());
        let (status, body) = send_json(&app.router, get_request("/ready")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"]["queue"]["status"], "ok");
        assert_eq!(body["checks"]["job_tracking"]["status"], "error");
    }

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let app = tracked_app(FakeQueue::default());
        let response = app.router.clone().oneshot(get_request("/health")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
