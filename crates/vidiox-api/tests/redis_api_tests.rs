//! End-to-end upload against a live Redis queue and status store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use vidiox_api::{create_router, ApiConfig, AppState};
use vidiox_models::JobStatus;
use vidiox_queue::{JobQueue, JobStatusTracker, QueueConfig, RedisStatusStore};
use vidiox_storage::LocalPublisher;

fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// An accepted upload is on the stream and has a queued record.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_upload_is_queued_and_tracked() {
    let dir = tempfile::tempdir().unwrap();
    let suffix = vidiox_models::JobId::new();
    let queue_config = QueueConfig {
        redis_url: redis_url(),
        stream_name: format!("vidiox:test:jobs:{suffix}"),
        consumer_group: format!("vidiox:test:workers:{suffix}"),
        dlq_stream_name: format!("vidiox:test:dlq:{suffix}"),
        max_retries: 3,
        max_pending: 10,
    };
    let queue = JobQueue::new(queue_config.clone()).expect("queue");
    queue.init().await.expect("init");
    let observer = JobQueue::new(queue_config).expect("queue");

    let tracker = JobStatusTracker::new(Arc::new(
        RedisStatusStore::new(&redis_url(), 60).expect("status store"),
    ));
    let config = ApiConfig {
        upload_dir: dir.path().join("uploads"),
        processed_dir: dir.path().join("processed"),
        ..ApiConfig::default()
    };
    let state = AppState::new(
        config,
        Arc::new(queue),
        tracker.clone(),
        Arc::new(LocalPublisher::new("http://localhost:5000")),
    );
    let router = create_router(state, None);

    let boundary = "b";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"clip.mp4\"\r\n\r\nbytes\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(observer.len().await.unwrap(), 1);
    let view = tracker
        .get_status(json["job_id"].as_str().unwrap())
        .await
        .unwrap();
    assert_eq!(view.status, JobStatus::Queued);
}
