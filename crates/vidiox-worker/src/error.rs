//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to get video information")]
    ProbeFailed(#[source] vidiox_media::MediaError),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("Failed to encode any video formats")]
    AllEncodingsFailed { attempted: usize },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vidiox_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vidiox_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vidiox_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Classify a probe failure.
    pub fn from_probe(err: vidiox_media::MediaError) -> Self {
        if err.is_no_video_stream() {
            Self::NoVideoStream
        } else {
            Self::ProbeFailed(err)
        }
    }

    /// Whether this is one of the failures the pipeline anticipates.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            WorkerError::ProbeFailed(_)
                | WorkerError::NoVideoStream
                | WorkerError::AllEncodingsFailed { .. }
                | WorkerError::Cancelled(_)
        )
    }

    /// Message recorded in the job status for this failure.
    pub fn status_message(&self) -> String {
        if self.is_expected() {
            self.to_string()
        } else {
            format!("Unexpected error: {}", self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidiox_media::MediaError;

    #[test]
    fn test_status_messages() {
        assert_eq!(
            WorkerError::from_probe(MediaError::NoVideoStream).status_message(),
            "No video stream found"
        );
        assert_eq!(
            WorkerError::from_probe(MediaError::ffprobe_failed("FFprobe failed", None))
                .status_message(),
            "Failed to get video information"
        );
        assert_eq!(
            WorkerError::AllEncodingsFailed { attempted: 3 }.status_message(),
            "Failed to encode any video formats"
        );
        assert_eq!(
            WorkerError::cancelled("job deadline of 60s exceeded").status_message(),
            "Cancelled: job deadline of 60s exceeded"
        );
        assert_eq!(
            WorkerError::Io(std::io::Error::other("disk full")).status_message(),
            "Unexpected error: IO error: disk full"
        );
    }
}
