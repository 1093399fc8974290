//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Heartbeats that must fit in `claim_min_idle`, so one late refresh does
/// not expose a live job to reclaiming.
const MIN_IDLE_HEARTBEATS: u32 = 3;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Deadline for a whole job
    pub job_timeout: Duration,
    /// How long shutdown waits for in-flight jobs before cancelling them
    pub shutdown_timeout: Duration,
    /// Directory encoded renditions and thumbnails are written to
    pub processed_dir: PathBuf,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Interval for refreshing ownership of a running job's queue entry
    pub job_heartbeat_interval: Duration,
    /// Timeout for a single ffmpeg/ffprobe invocation
    pub ffmpeg_timeout: Duration,
    /// Port for the Prometheus listener, disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            processed_dir: PathBuf::from("/tmp/processed"),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300), // 5 minutes
            job_heartbeat_interval: Duration::from_secs(30),
            ffmpeg_timeout: Duration::from_secs(7200),
            metrics_port: None,
        }
    }
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            job_timeout: env_secs("WORKER_JOB_TIMEOUT", 3600),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", 30),
            processed_dir: std::env::var("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/processed")),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", 30),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS", 300),
            job_heartbeat_interval: env_secs("WORKER_JOB_HEARTBEAT_SECS", 30),
            ffmpeg_timeout: env_secs("FFMPEG_TIMEOUT_SECS", 7200),
            metrics_port: std::env::var("WORKER_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
        .normalized()
    }

    /// Keep the heartbeat positive and `claim_min_idle` well above it.
    pub fn normalized(mut self) -> Self {
        if self.job_heartbeat_interval.is_zero() {
            self.job_heartbeat_interval = Duration::from_secs(1);
        }
        let floor = self.job_heartbeat_interval * MIN_IDLE_HEARTBEATS;
        if self.claim_min_idle < floor {
            warn!(
                "claim_min_idle {:?} is below {} heartbeats, raising to {:?}",
                self.claim_min_idle, MIN_IDLE_HEARTBEATS, floor
            );
            self.claim_min_idle = floor;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.job_timeout, Duration::from_secs(3600));
        assert_eq!(config.processed_dir, PathBuf::from("/tmp/processed"));
        assert!(config.metrics_port.is_none());
        assert!(config.claim_min_idle >= config.job_heartbeat_interval * MIN_IDLE_HEARTBEATS);
    }

    #[test]
    fn test_claim_min_idle_outlasts_heartbeats() {
        let config = WorkerConfig {
            claim_min_idle: Duration::from_secs(10),
            job_heartbeat_interval: Duration::from_secs(30),
            ..WorkerConfig::default()
        }
        .normalized();
        assert_eq!(config.claim_min_idle, Duration::from_secs(90));

        let config = WorkerConfig {
            job_heartbeat_interval: Duration::ZERO,
            ..WorkerConfig::default()
        }
        .normalized();
        assert_eq!(config.job_heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.claim_min_idle, Duration::from_secs(300));
    }
}
