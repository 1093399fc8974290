//! Queue error types.

use thiserror::Error;
use vidiox_models::StatusTransitionError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),

    #[error("Queue full: {pending} pending jobs (max {max})")]
    QueueFull { pending: u64, max: u64 },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job tracking not available: {0}")]
    StatusStoreUnavailable(String),

    #[error("Invalid status record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    StatusTransition(#[from] StatusTransitionError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StatusStoreUnavailable(msg.into())
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}
