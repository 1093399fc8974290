//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vidiox_models::{JobStatus, JobView, TranscodeJob};
use vidiox_queue::{JobQueue, JobStatusTracker};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{JobOutcome, Pipeline};
use crate::retry::FailureTracker;

/// Jobs read per XREADGROUP call, at most.
const MAX_BATCH: usize = 5;
/// How long shutdown waits for cancelled jobs to write their status.
const CANCEL_GRACE: Duration = Duration::from_secs(10);

/// Handles every job task needs.
#[derive(Clone)]
struct JobContext {
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
    consumer_name: Arc<str>,
    heartbeat_interval: Duration,
    /// A `processing` record updated more recently than this belongs to a
    /// live worker.
    stale_after: Duration,
}

/// Job executor that runs transcode jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: JobContext,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: Pipeline) -> Self {
        let config = config.normalized();
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let (cancel, _) = watch::channel(false);
        let ctx = JobContext {
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            consumer_name: Arc::from(format!("worker-{}", Uuid::new_v4())),
            heartbeat_interval: config.job_heartbeat_interval,
            stale_after: config.claim_min_idle,
        };

        Self {
            config,
            ctx,
            job_semaphore,
            shutdown,
            cancel,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.ctx.consumer_name
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.ctx.consumer_name, self.config.max_concurrent_jobs
        );

        self.ctx.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();

        let mut failures = FailureTracker::new(5);
        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => match result {
                    Ok(()) => failures.record_success(),
                    Err(e) => {
                        if failures.record_failure() {
                            error!("Error consuming jobs: {}", e);
                        }
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}, cancelling",
                self.config.shutdown_timeout
            );
            self.cancel.send_replace(true);
            let _ = tokio::time::timeout(CANCEL_GRACE, self.wait_for_jobs()).await;
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Periodically take over entries left pending by crashed consumers.
    fn spawn_claim_task(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let semaphore = Arc::clone(&self.job_semaphore);
        let cancel_rx = self.cancel.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let max_jobs = self.config.max_concurrent_jobs;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let jobs = match ctx.queue.claim_pending(&ctx.consumer_name, min_idle_ms, MAX_BATCH).await {
                            Ok(jobs) => jobs,
                            Err(e) => {
                                warn!("Failed to claim pending jobs: {}", e);
                                continue;
                            }
                        };
                        if jobs.is_empty() {
                            continue;
                        }

                        info!("Claimed {} pending jobs", jobs.len());
                        for (message_id, job) in jobs {
                            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                return;
                            };
                            let ctx = ctx.clone();
                            let semaphore = Arc::clone(&semaphore);
                            let cancel_rx = cancel_rx.clone();
                            tokio::spawn(async move {
                                metrics::set_jobs_in_flight(max_jobs - semaphore.available_permits());
                                Self::execute_claimed(ctx, message_id, job, cancel_rx).await;
                                drop(permit);
                                metrics::set_jobs_in_flight(max_jobs - semaphore.available_permits());
                            });
                        }
                    }
                }
            }
        })
    }

    /// Consume new jobs, up to the free slots.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .ctx
            .queue
            .consume(&self.ctx.consumer_name, 1000, available.min(MAX_BATCH))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let ctx = self.ctx.clone();
            let semaphore = Arc::clone(&self.job_semaphore);
            let cancel_rx = self.cancel.subscribe();
            let max_jobs = self.config.max_concurrent_jobs;

            tokio::spawn(async move {
                metrics::set_jobs_in_flight(max_jobs - semaphore.available_permits());
                Self::execute_job(ctx, message_id, job, cancel_rx).await;
                drop(permit);
                metrics::set_jobs_in_flight(max_jobs - semaphore.available_permits());
            });
        }

        Ok(())
    }

    /// Run a redelivered job, unless it already finished, is still owned by
    /// a live worker, or has been delivered too often.
    async fn execute_claimed(
        ctx: JobContext,
        message_id: String,
        job: TranscodeJob,
        cancel: watch::Receiver<bool>,
    ) {
        let job_id = job.job_id.to_string();

        let view = ctx.pipeline.tracker().get_status(&job_id).await.ok();
        match reclaim_action(view.as_ref(), Utc::now(), ctx.stale_after) {
            Reclaim::Drop => {
                debug!("Job {} already finished, dropping stale entry", job_id);
                if let Err(e) = ctx.queue.ack(&message_id).await {
                    error!("Failed to ack job {}: {}", job_id, e);
                }
                return;
            }
            Reclaim::Defer => {
                debug!("Job {} is still being processed, leaving it", job_id);
                return;
            }
            Reclaim::Run => {}
        }

        let attempts = match ctx.queue.increment_retry(&message_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to count delivery of job {}: {}", job_id, e);
                return;
            }
        };

        let max_retries = ctx.queue.max_retries();
        if attempts > max_retries {
            warn!(
                "Job {} exceeded max retries ({}), moving to DLQ",
                job_id, max_retries
            );
            let reason = format!("abandoned after {} delivery attempts", attempts);
            if let Err(e) = ctx.queue.dlq(&message_id, &job, &reason).await {
                error!("Failed to move job {} to DLQ: {}", job_id, e);
            }
            metrics::record_job_dead_lettered();
            if let Err(e) = ctx
                .pipeline
                .tracker()
                .set_status(
                    &job_id,
                    JobStatus::Error,
                    format!("Unexpected error: job {}", reason),
                    None,
                )
                .await
            {
                warn!("Failed to record DLQ status for job {}: {}", job_id, e);
            }
            return;
        }

        info!(
            "Retrying job {} (attempt {}/{})",
            job_id, attempts, max_retries
        );
        Self::execute_job(ctx, message_id, job, cancel).await;
    }

    /// Run one job to a terminal status, then ack it.
    ///
    /// The queue entry is refreshed while the job runs so other workers do
    /// not reclaim it.
    async fn execute_job(
        ctx: JobContext,
        message_id: String,
        job: TranscodeJob,
        cancel: watch::Receiver<bool>,
    ) {
        let job_id = job.job_id.to_string();
        info!("Executing job {}", job_id);

        let heartbeat = spawn_heartbeat(&ctx, &message_id);
        let handle = {
            let pipeline = Arc::clone(&ctx.pipeline);
            let job = job.clone();
            tokio::spawn(async move { pipeline.execute(&job, cancel).await })
        };

        let outcome = finish_job(ctx.pipeline.tracker(), &job_id, handle).await;
        heartbeat.abort();

        match outcome {
            JobOutcome::Completed(result) => info!(
                "Job {} completed with {} renditions",
                job_id,
                result.artifacts.len()
            ),
            JobOutcome::Failed { message } => warn!("Job {} failed: {}", job_id, message),
        }

        if let Err(e) = ctx.queue.ack(&message_id).await {
            error!("Failed to ack job {}: {}", job_id, e);
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// What to do with an entry claimed from the pending list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reclaim {
    /// Already terminal: ack and forget.
    Drop,
    /// Recently active: leave it for its owner.
    Defer,
    /// Abandoned: run it again.
    Run,
}

fn reclaim_action(view: Option<&JobView>, now: DateTime<Utc>, stale_after: Duration) -> Reclaim {
    let Some(view) = view else {
        return Reclaim::Run;
    };
    if view.status.is_terminal() {
        return Reclaim::Drop;
    }

    // A timestamp in the future counts as fresh.
    let age = now
        .signed_duration_since(view.updated_at)
        .to_std()
        .unwrap_or_default();
    if view.status == JobStatus::Processing && age < stale_after {
        Reclaim::Defer
    } else {
        Reclaim::Run
    }
}

/// Keep the job's queue entry owned by this consumer until aborted.
fn spawn_heartbeat(ctx: &JobContext, message_id: &str) -> JoinHandle<()> {
    let queue = Arc::clone(&ctx.queue);
    let consumer_name = Arc::clone(&ctx.consumer_name);
    let message_id = message_id.to_string();
    let period = ctx.heartbeat_interval;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; the entry was just delivered.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = queue.refresh(&consumer_name, &message_id).await {
                warn!("Failed to refresh lease on {}: {}", message_id, e);
            }
        }
    })
}

/// Wait for a pipeline task; a panic is recorded as an unexpected error so
/// the record does not stay at `processing`.
async fn finish_job(
    tracker: &JobStatusTracker,
    job_id: &str,
    handle: JoinHandle<JobOutcome>,
) -> JobOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Job {} panicked: {}", job_id, e);
            let message = format!("Unexpected error: {}", e);
            if let Err(status_err) = tracker
                .set_status(job_id, JobStatus::Error, message.clone(), None)
                .await
            {
                warn!("Failed to record panic for job {}: {}", job_id, status_err);
            }
            JobOutcome::Failed { message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use vidiox_media::{MediaResult, MediaToolkit};
    use vidiox_models::{EncodingProfile, VideoId, VideoInfo};
    use vidiox_queue::MemoryStatusStore;
    use vidiox_storage::LocalPublisher;

    struct PanickingToolkit;

    #[async_trait]
    impl MediaToolkit for PanickingToolkit {
        async fn probe(&self, _input: &Path) -> MediaResult<VideoInfo> {
            panic!("ffprobe handler crashed")
        }

        async fn extract_thumbnail(&self, _: &Path, _: &Path, _: &str) -> MediaResult<()> {
            unreachable!("media inspection panics first")
        }

        async fn encode(&self, _: &Path, _: &Path, _: &EncodingProfile) -> MediaResult<()> {
            unreachable!("media inspection panics first")
        }
    }

    fn view(status: JobStatus, updated_at: DateTime<Utc>) -> JobView {
        JobView {
            job_id: "job".to_string(),
            status,
            message: String::new(),
            updated_at,
            video_id: None,
            original_filename: None,
            created_at: None,
            data: None,
        }
    }

    #[tokio::test]
    async fn test_panicking_job_is_recorded_as_unexpected_error() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JobStatusTracker::new(Arc::new(MemoryStatusStore::new()));
        let job = TranscodeJob::new(VideoId::new(), dir.path().join("in.mp4"), "in.mp4");
        std::fs::write(job.input_path(), b"source").unwrap();
        tracker.create(&job, "Video processing job started").await.unwrap();

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PanickingToolkit),
            Arc::new(LocalPublisher::new("http://localhost:5000")),
            tracker.clone(),
            dir.path().join("processed"),
        ));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let handle = {
            let pipeline = Arc::clone(&pipeline);
            let job = job.clone();
            tokio::spawn(async move { pipeline.execute(&job, cancel_rx).await })
        };

        let outcome = finish_job(&tracker, job.job_id.as_str(), handle).await;
        let JobOutcome::Failed { message } = outcome else {
            panic!("a panicking job cannot complete");
        };
        assert!(message.starts_with("Unexpected error: "), "{message}");

        let record = tracker.get_status(job.job_id.as_str()).await.unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.message, message);
        assert!(job.input_path().exists());
    }

    #[tokio::test]
    async fn test_finished_job_outcome_passes_through() {
        let tracker = JobStatusTracker::new(Arc::new(MemoryStatusStore::new()));
        let handle = tokio::spawn(async {
            JobOutcome::Failed {
                message: "Failed to get video information".to_string(),
            }
        });

        let outcome = finish_job(&tracker, "job", handle).await;
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                message: "Failed to get video information".to_string()
            }
        );
        assert!(tracker.get_status("job").await.is_err());
    }

    #[test]
    fn test_terminal_records_are_dropped() {
        let now = Utc::now();
        let stale_after = Duration::from_secs(300);
        for status in [JobStatus::Completed, JobStatus::Error] {
            assert_eq!(
                reclaim_action(Some(&view(status, now)), now, stale_after),
                Reclaim::Drop
            );
        }
    }

    #[test]
    fn test_live_processing_record_is_left_alone() {
        let now = Utc::now();
        let stale_after = Duration::from_secs(300);

        let recent = view(JobStatus::Processing, now - chrono::Duration::seconds(10));
        assert_eq!(reclaim_action(Some(&recent), now, stale_after), Reclaim::Defer);

        let ahead = view(JobStatus::Processing, now + chrono::Duration::seconds(5));
        assert_eq!(reclaim_action(Some(&ahead), now, stale_after), Reclaim::Defer);
    }

    #[test]
    fn test_abandoned_jobs_are_rerun() {
        let now = Utc::now();
        let stale_after = Duration::from_secs(300);

        let stale = view(JobStatus::Processing, now - chrono::Duration::seconds(600));
        assert_eq!(reclaim_action(Some(&stale), now, stale_after), Reclaim::Run);

        let queued = view(JobStatus::Queued, now);
        assert_eq!(reclaim_action(Some(&queued), now, stale_after), Reclaim::Run);

        assert_eq!(reclaim_action(None, now, stale_after), Reclaim::Run);
    }
}
