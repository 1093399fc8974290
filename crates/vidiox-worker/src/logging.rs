//! Structured job logging.
//!
//! Every line carries `job_id` and `video_id` so one transcode can be
//! followed across the probe, encode and publish stages.

use std::time::Instant;
use tracing::{error, info, warn, Span};
use vidiox_models::TranscodeJob;

/// Logger bound to one transcode job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(job: &TranscodeJob) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            video_id: job.video_id.to_string(),
            started: Instant::now(),
        }
    }

    /// Log the start of the job.
    pub fn log_start(&self, input: &std::path::Path) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            input = %input.display(),
            "Transcode started"
        );
    }

    /// Log a status message as it is published.
    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            "Job progress: {}", message
        );
    }

    /// Log the outcome of one rendition.
    pub fn log_rendition(&self, profile: &str, elapsed_secs: f64, failure: Option<&str>) {
        match failure {
            None => info!(
                job_id = %self.job_id,
                profile,
                elapsed_secs,
                "Rendition encoded"
            ),
            Some(reason) => warn!(
                job_id = %self.job_id,
                profile,
                elapsed_secs,
                reason,
                "Rendition failed, skipping"
            ),
        }
    }

    /// Log a non-fatal problem.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            "Job warning: {}", message
        );
    }

    /// Log the terminal failure of the job.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            elapsed_secs = self.elapsed_secs(),
            "Job failed: {}", message
        );
    }

    /// Log successful completion.
    pub fn log_completion(&self, renditions: usize, failed: usize) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            renditions,
            failed,
            elapsed_secs = self.elapsed_secs(),
            "Transcode completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Seconds since the logger was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "transcode",
            job_id = %self.job_id,
            video_id = %self.video_id
        )
    }
}
