//! Redis integration tests for the queue and status store.

use std::sync::Arc;

use vidiox_models::{JobStatus, TranscodeJob, VideoId};
use vidiox_queue::{
    JobQueue, JobStatusTracker, QueueConfig, QueueError, RedisStatusStore, StatusStore,
};

fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn isolated_config(max_pending: u64) -> QueueConfig {
    let suffix = uuid_suffix();
    QueueConfig {
        redis_url: redis_url(),
        stream_name: format!("vidiox:test:jobs:{suffix}"),
        consumer_group: format!("vidiox:test:workers:{suffix}"),
        dlq_stream_name: format!("vidiox:test:dlq:{suffix}"),
        max_retries: 3,
        max_pending,
    }
}

fn uuid_suffix() -> String {
    vidiox_models::JobId::new().to_string()
}

fn sample_job() -> TranscodeJob {
    TranscodeJob::new(VideoId::new(), "/tmp/uploads/test_original.mp4", "test.mp4")
}

/// Test job enqueue, consume and ack cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_consume_ack() {
    let queue = JobQueue::new(isolated_config(10)).expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = sample_job();
    let message_id = queue.enqueue(&job).await.expect("Failed to enqueue");
    assert_eq!(queue.len().await.unwrap(), 1);

    let consumed = queue.consume("test-consumer", 1000, 1).await.expect("Failed to consume");
    assert_eq!(consumed.len(), 1);
    assert_eq!(consumed[0].0, message_id);
    assert_eq!(consumed[0].1, job);

    queue.ack(&message_id).await.expect("Failed to ack");
    assert_eq!(queue.len().await.unwrap(), 0);
}

/// Test the pending bound refuses new jobs.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_refused_when_full() {
    let queue = JobQueue::new(isolated_config(1)).expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    queue.enqueue(&sample_job()).await.expect("first enqueue");
    let err = queue.enqueue(&sample_job()).await.unwrap_err();
    assert!(matches!(err, QueueError::QueueFull { pending: 1, max: 1 }));
}

/// Test stalled entries are claimed by another consumer.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_claim_pending_and_dlq() {
    let queue = JobQueue::new(isolated_config(10)).expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = sample_job();
    let message_id = queue.enqueue(&job).await.unwrap();
    queue.consume("crashed-worker", 1000, 1).await.unwrap();

    let claimed = queue.claim_pending("rescuer", 0, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].0, message_id);

    assert_eq!(queue.increment_retry(&message_id).await.unwrap(), 1);
    queue.dlq(&message_id, &job, "test").await.unwrap();
    assert_eq!(queue.len().await.unwrap(), 0);
    assert_eq!(queue.dlq_len().await.unwrap(), 1);
}

/// Test a refreshed entry is not idle enough to be claimed.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_refreshed_entry_is_not_claimed() {
    let queue = JobQueue::new(isolated_config(10)).expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let message_id = queue.enqueue(&sample_job()).await.unwrap();
    queue.consume("busy-worker", 1000, 1).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    queue.refresh("busy-worker", &message_id).await.unwrap();
    assert!(queue.claim_pending("rescuer", 200, 10).await.unwrap().is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let claimed = queue.claim_pending("rescuer", 200, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
}

/// Test status records round-trip through Redis with the forward-only guard.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_status_record_roundtrip() {
    let store = Arc::new(RedisStatusStore::new(&redis_url(), 60).expect("store"));
    store.ping().await.expect("ping");
    let tracker = JobStatusTracker::new(store);

    let job = sample_job();
    let id = job.job_id.to_string();
    tracker.create(&job, "Video processing job started").await.unwrap();
    tracker
        .set_status(&id, JobStatus::Processing, "Starting video processing", None)
        .await
        .unwrap();
    assert!(tracker
        .set_status(&id, JobStatus::Queued, "back", None)
        .await
        .is_err());

    let view = tracker.get_status(&id).await.unwrap();
    assert_eq!(view.status, JobStatus::Processing);
    assert_eq!(view.original_filename.as_deref(), Some("test.mp4"));
}
