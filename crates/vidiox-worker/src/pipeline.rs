//! The per-job transcode pipeline.
//!
//! A job moves `queued -> processing -> {completed | error}`:
//! probe the input, choose renditions, grab a thumbnail, encode each
//! rendition in ladder order, publish what was produced and record the
//! result. Per-rendition and per-artifact failures are absorbed; the job only
//! fails when a whole stage does. The input file is removed only after the
//! job has completed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::Instrument;

use vidiox_media::MediaToolkit;
use vidiox_models::encoding::THUMBNAIL_TIMESTAMP;
use vidiox_models::{
    select_profiles, EncodedArtifact, EncodingProfile, JobResult, JobStatus, TranscodeJob,
    RENDITION_LADDER,
};
use vidiox_queue::JobStatusTracker;
use vidiox_storage::{ArtifactKind, ArtifactPublisher};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

pub const MSG_STARTING: &str = "Starting video processing";
pub const MSG_UPLOADING: &str = "Uploading to cloud storage";
pub const MSG_COMPLETED: &str = "Video processing completed successfully";

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobResult),
    Failed { message: String },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

/// Publishes status changes for one job, never moving backwards.
///
/// Store failures are logged and swallowed: losing a progress message must
/// not fail the transcode.
struct JobReporter<'a> {
    tracker: &'a JobStatusTracker,
    logger: &'a JobLogger,
    current: Mutex<JobStatus>,
}

impl<'a> JobReporter<'a> {
    fn new(tracker: &'a JobStatusTracker, logger: &'a JobLogger) -> Self {
        Self {
            tracker,
            logger,
            current: Mutex::new(JobStatus::Queued),
        }
    }

    async fn report(&self, status: JobStatus, message: &str, result: Option<JobResult>) {
        {
            let mut current = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(e) = current.transition_to(status) {
                self.logger.log_warning(&format!("dropping status write: {}", e));
                return;
            }
            *current = status;
        }

        self.logger.log_progress(message);
        if let Err(e) = self
            .tracker
            .set_status(self.logger.job_id(), status, message, result)
            .await
        {
            self.logger
                .log_warning(&format!("status not persisted ({}): {}", status, e));
        }
    }
}

/// Runs transcode jobs against a media toolkit and an artifact publisher.
pub struct Pipeline {
    toolkit: Arc<dyn MediaToolkit>,
    publisher: Arc<dyn ArtifactPublisher>,
    tracker: JobStatusTracker,
    processed_dir: PathBuf,
    job_timeout: Duration,
    publish_retry: RetryConfig,
}

impl Pipeline {
    pub fn new(
        toolkit: Arc<dyn MediaToolkit>,
        publisher: Arc<dyn ArtifactPublisher>,
        tracker: JobStatusTracker,
        processed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            toolkit,
            publisher,
            tracker,
            processed_dir: processed_dir.into(),
            job_timeout: Duration::from_secs(3600),
            publish_retry: RetryConfig::new("publish_artifact"),
        }
    }

    /// Set the deadline for a whole job.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Set the retry policy for remote publication.
    pub fn with_publish_retry(mut self, retry: RetryConfig) -> Self {
        self.publish_retry = retry;
        self
    }

    pub fn tracker(&self) -> &JobStatusTracker {
        &self.tracker
    }

    /// Run one job to a terminal status.
    ///
    /// The job is abandoned when its deadline passes or `cancel` turns true;
    /// any running tool is killed and the job ends in `error` with a
    /// `Cancelled:` message. The input is kept unless the job completed.
    pub async fn execute(&self, job: &TranscodeJob, cancel: watch::Receiver<bool>) -> JobOutcome {
        let logger = JobLogger::new(job);
        let span = logger.create_span();
        self.run(job, &logger, cancel).instrument(span).await
    }

    async fn run(
        &self,
        job: &TranscodeJob,
        logger: &JobLogger,
        mut cancel: watch::Receiver<bool>,
    ) -> JobOutcome {
        let reporter = JobReporter::new(&self.tracker, logger);
        let started = Instant::now();

        logger.log_start(job.input_path());
        metrics::record_job_started();

        let result = tokio::select! {
            result = self.process(job, &reporter, logger) => result,
            _ = tokio::time::sleep(self.job_timeout) => Err(WorkerError::cancelled(format!(
                "job deadline of {}s exceeded",
                self.job_timeout.as_secs()
            ))),
            _ = cancelled(&mut cancel) => Err(WorkerError::cancelled("worker shutting down")),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(job_result) => {
                reporter
                    .report(JobStatus::Completed, MSG_COMPLETED, Some(job_result.clone()))
                    .await;
                remove_input(job.input_path(), logger).await;
                metrics::record_job_finished(true, "", elapsed);
                JobOutcome::Completed(job_result)
            }
            Err(e) => {
                let message = e.status_message();
                logger.log_error(&message);
                reporter.report(JobStatus::Error, &message, None).await;
                metrics::record_job_finished(false, failure_label(&e), elapsed);
                JobOutcome::Failed { message }
            }
        }
    }

    async fn process(
        &self,
        job: &TranscodeJob,
        reporter: &JobReporter<'_>,
        logger: &JobLogger,
    ) -> WorkerResult<JobResult> {
        reporter.report(JobStatus::Processing, MSG_STARTING, None).await;

        let input = job.input_path();
        let info = self
            .toolkit
            .probe(input)
            .await
            .map_err(WorkerError::from_probe)?;

        let profiles = select_profiles(&RENDITION_LADDER, info.height);

        tokio::fs::create_dir_all(&self.processed_dir).await?;

        let thumbnail_path = self.processed_dir.join(job.thumbnail_filename());
        let thumbnail_ok = match self
            .toolkit
            .extract_thumbnail(input, &thumbnail_path, THUMBNAIL_TIMESTAMP)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                logger.log_warning(&format!("thumbnail extraction failed: {}", e));
                false
            }
        };

        let total = profiles.len();
        let mut artifacts = Vec::with_capacity(total);
        for (i, profile) in profiles.iter().enumerate() {
            reporter
                .report(
                    JobStatus::Processing,
                    &format!("Encoding {} ({}/{})", profile.name, i + 1, total),
                    None,
                )
                .await;

            if let Some(artifact) = self.encode_one(job, profile, logger).await {
                artifacts.push(artifact);
            }
        }

        if artifacts.is_empty() {
            return Err(WorkerError::AllEncodingsFailed { attempted: total });
        }
        if artifacts.len() < total {
            logger.log_warning(&format!(
                "{} of {} renditions failed",
                total - artifacts.len(),
                total
            ));
        }

        if self.publisher.is_remote() {
            reporter.report(JobStatus::Processing, MSG_UPLOADING, None).await;
        }

        for artifact in &mut artifacts {
            artifact.url = self
                .publish(&artifact.local_path, &artifact.filename, ArtifactKind::Rendition, logger)
                .await;
        }

        let thumbnail_url = if thumbnail_ok && tokio::fs::try_exists(&thumbnail_path).await? {
            self.publish(
                &thumbnail_path,
                &job.thumbnail_filename(),
                ArtifactKind::Thumbnail,
                logger,
            )
            .await
        } else {
            None
        };

        logger.log_completion(artifacts.len(), total - artifacts.len());

        Ok(JobResult {
            artifacts,
            thumbnail_url,
            duration_seconds: info.duration_seconds,
            video_info: info,
        })
    }

    /// Encode one rendition; `None` if it failed and should be skipped.
    async fn encode_one(
        &self,
        job: &TranscodeJob,
        profile: &EncodingProfile,
        logger: &JobLogger,
    ) -> Option<EncodedArtifact> {
        let filename = job.rendition_filename(profile.name);
        let output = self.processed_dir.join(&filename);
        let started = Instant::now();

        let outcome = match self.toolkit.encode(job.input_path(), &output, profile).await {
            Ok(()) => tokio::fs::metadata(&output)
                .await
                .map(|m| m.len())
                .map_err(|e| format!("output missing after encode: {}", e)),
            Err(e) => Err(e.to_string()),
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_encode(profile.name, outcome.is_ok(), elapsed);

        match outcome {
            Ok(size_bytes) => {
                logger.log_rendition(profile.name, elapsed, None);
                Some(EncodedArtifact {
                    profile_name: profile.name.to_string(),
                    filename,
                    local_path: output,
                    size_bytes,
                    bitrate_bps: profile.video_bitrate_bps,
                    url: None,
                })
            }
            Err(reason) => {
                logger.log_rendition(profile.name, elapsed, Some(&reason));
                // Partial output must not be served.
                let _ = tokio::fs::remove_file(&output).await;
                None
            }
        }
    }

    /// Publish one file; failures leave the URL unset.
    async fn publish(
        &self,
        path: &Path,
        filename: &str,
        kind: ArtifactKind,
        logger: &JobLogger,
    ) -> Option<String> {
        let result = if self.publisher.is_remote() {
            retry_async(
                &self.publish_retry,
                || self.publisher.publish(path, filename, kind),
                |e| e.is_retryable(),
            )
            .await
            .map_err(|(e, attempts)| format!("{} (after {} attempts)", e, attempts))
        } else {
            self.publisher
                .publish(path, filename, kind)
                .await
                .map_err(|e| e.to_string())
        };

        match result {
            Ok(url) => Some(url),
            Err(reason) => {
                logger.log_warning(&format!("failed to publish {}: {}", filename, reason));
                metrics::record_publish_failure(match kind {
                    ArtifactKind::Rendition => "rendition",
                    ArtifactKind::Thumbnail => "thumbnail",
                });
                None
            }
        }
    }
}

/// Resolves once `rx` reads true; never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn remove_input(path: &Path, logger: &JobLogger) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        logger.log_warning(&format!("could not remove input {}: {}", path.display(), e));
    }
}

fn failure_label(err: &WorkerError) -> &'static str {
    match err {
        WorkerError::ProbeFailed(_) => "probe",
        WorkerError::NoVideoStream => "no_video_stream",
        WorkerError::AllEncodingsFailed { .. } => "encode",
        WorkerError::Cancelled(_) => "cancelled",
        _ => "unexpected",
    }
}
