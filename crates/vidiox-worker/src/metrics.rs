//! Prometheus metrics for the worker.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vidiox_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vidiox_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vidiox_jobs_failed_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "vidiox_jobs_dead_lettered_total";
    pub const JOB_DURATION_SECONDS: &str = "vidiox_job_duration_seconds";
    pub const JOBS_IN_FLIGHT: &str = "vidiox_jobs_in_flight";

    pub const ENCODE_DURATION_SECONDS: &str = "vidiox_encode_duration_seconds";
    pub const ENCODE_FAILURES_TOTAL: &str = "vidiox_encode_failures_total";
    pub const PUBLISH_FAILURES_TOTAL: &str = "vidiox_publish_failures_total";
}

/// Serve metrics on `0.0.0.0:port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics listener: {}", e)))
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

/// Record a terminal outcome; `reason` is a short label such as "probe".
pub fn record_job_finished(succeeded: bool, reason: &'static str, duration_secs: f64) {
    if succeeded {
        counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    } else {
        counter!(names::JOBS_FAILED_TOTAL, "reason" => reason).increment(1);
    }
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_dead_lettered() {
    counter!(names::JOBS_DEAD_LETTERED_TOTAL).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

/// Record one encode attempt.
pub fn record_encode(profile: &'static str, succeeded: bool, duration_secs: f64) {
    histogram!(names::ENCODE_DURATION_SECONDS, "profile" => profile).record(duration_secs);
    if !succeeded {
        counter!(names::ENCODE_FAILURES_TOTAL, "profile" => profile).increment(1);
    }
}

pub fn record_publish_failure(kind: &'static str) {
    counter!(names::PUBLISH_FAILURES_TOTAL, "kind" => kind).increment(1);
}
