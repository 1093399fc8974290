//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload and job submission (`POST /process`)
//! - Job status polling (`GET /job/:job_id`)
//! - Serving of locally published artifacts (`/processed`)
//! - Health, readiness and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, JobSubmitter};
