//! Transcoding worker.
//!
//! This crate provides:
//! - The per-job pipeline: probe, select, thumbnail, encode, publish
//! - A bounded executor over the Redis job queue
//! - Per-job deadlines and shutdown cancellation
//! - Structured job logging, retry helpers and metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{JobOutcome, Pipeline};
