//! Redis-backed job queue and job status tracking.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with a pending-entry bound
//! - Worker consumption with reclaim of stalled entries and a DLQ
//! - The job status record (`job:<id>` hashes with a TTL) and its tracker

pub mod error;
pub mod queue;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, QueueConfig};
pub use status::{
    JobStatusTracker, MemoryStatusStore, RedisStatusStore, StatusStore, JOB_STATUS_TTL_SECS,
};
