//! Application state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use vidiox_models::TranscodeJob;
use vidiox_queue::{JobQueue, JobStatusTracker, QueueResult, RedisStatusStore};
use vidiox_storage::{build_publisher, ArtifactPublisher, StorageConfig};

use crate::config::ApiConfig;

/// Where accepted jobs are handed off for processing.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Queue a job, returning its message ID.
    async fn submit(&self, job: &TranscodeJob) -> QueueResult<String>;

    /// Check the queue answers.
    async fn ping(&self) -> QueueResult<()>;
}

#[async_trait]
impl JobSubmitter for JobQueue {
    async fn submit(&self, job: &TranscodeJob) -> QueueResult<String> {
        self.enqueue(job).await
    }

    async fn ping(&self) -> QueueResult<()> {
        JobQueue::ping(self).await
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: Arc<dyn JobSubmitter>,
    pub tracker: JobStatusTracker,
    pub storage: Arc<dyn ArtifactPublisher>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        jobs: Arc<dyn JobSubmitter>,
        tracker: JobStatusTracker,
        storage: Arc<dyn ArtifactPublisher>,
    ) -> Self {
        Self {
            config,
            jobs,
            tracker,
            storage,
        }
    }

    /// Build state from the environment.
    ///
    /// A missing or unreachable status store degrades job tracking instead of
    /// failing startup.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let queue = JobQueue::from_env()?;
        if let Err(e) = queue.init().await {
            warn!("Job queue not initialized, uploads will be refused until Redis is reachable: {}", e);
        }

        let tracker = match RedisStatusStore::from_env() {
            Ok(store) => JobStatusTracker::new(Arc::new(store)),
            Err(e) => {
                warn!("Job tracking disabled: {}", e);
                JobStatusTracker::disabled()
            }
        };

        let storage = build_publisher(&StorageConfig::from_env()?).await?;

        Ok(Self::new(config, Arc::new(queue), tracker, storage))
    }
}
