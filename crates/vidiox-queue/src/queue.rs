//! Job queue using Redis Streams.
//!
//! Acknowledged entries are deleted from the stream, so `XLEN` counts jobs
//! that are waiting or in flight. That count is what enqueue bounds.

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use vidiox_models::TranscodeJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max reclaims before DLQ
    pub max_retries: u32,
    /// Enqueue is refused once this many jobs are waiting or in flight
    pub max_pending: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vidiox:jobs".to_string(),
            consumer_group: "vidiox:workers".to_string(),
            dlq_stream_name: "vidiox:dlq".to_string(),
            max_retries: 3,
            max_pending: 100,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            max_pending: std::env::var("QUEUE_MAX_PENDING")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_pending),
        }
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        // Create consumer group (ignore error if already exists)
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Check the Redis server answers.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Enqueue a transcode job, refusing it when the queue is at capacity.
    pub async fn enqueue(&self, job: &TranscodeJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;

        let pending: u64 = conn.xlen(&self.config.stream_name).await?;
        if pending >= self.config.max_pending {
            warn!(
                job_id = %job.job_id,
                pending,
                max = self.config.max_pending,
                "Queue full, refusing job"
            );
            return Err(QueueError::QueueFull {
                pending,
                max: self.config.max_pending,
            });
        }

        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("job_id")
            .arg(job.job_id.as_str())
            .query_async(&mut conn)
            .await?;

        info!(
            "Enqueued job {} with message ID {}",
            job.job_id,
            message_id
        );

        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, job: &TranscodeJob, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!("Moved job {} to DLQ: {}", job.job_id, error);
        Ok(())
    }

    /// Get queue length (waiting plus in-flight jobs).
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Read up to `count` new jobs for this consumer, blocking up to `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, TranscodeJob)>> {
        let mut conn = self.connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(job) = self.decode_entry(&entry, "Consumed").await {
                    jobs.push((entry.id.clone(), job));
                }
            }
        }

        Ok(jobs)
    }

    /// Claim jobs left pending for at least `min_idle_ms`.
    ///
    /// This handles jobs from crashed workers. Live workers keep their
    /// entries fresh with [`refresh`](Self::refresh), so only abandoned
    /// entries go idle long enough to be claimed.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, TranscodeJob)>> {
        let mut conn = self.connection().await?;

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for entry in &pending.ids {
            cmd.arg(&entry.id);
        }

        let result: redis::streams::StreamClaimReply = cmd.query_async(&mut conn).await?;

        let mut jobs = Vec::new();
        for entry in result.ids {
            if let Some(job) = self.decode_entry(&entry, "Claimed pending").await {
                jobs.push((entry.id.clone(), job));
            }
        }

        Ok(jobs)
    }

    /// Re-claim an entry this consumer is still working on, resetting its
    /// idle time so `claim_pending` elsewhere leaves it alone.
    ///
    /// `JUSTID` keeps the delivery counter unchanged.
    pub async fn refresh(&self, consumer_name: &str, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(0)
            .arg(message_id)
            .arg("JUSTID")
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Refreshed lease on {} for {}", message_id, consumer_name);
        Ok(())
    }

    /// Decode a stream entry, acking it away if the payload is unusable.
    async fn decode_entry(
        &self,
        entry: &redis::streams::StreamId,
        action: &str,
    ) -> Option<TranscodeJob> {
        let decoded = match entry.map.get("job") {
            Some(redis::Value::BulkString(payload)) => {
                serde_json::from_slice::<TranscodeJob>(payload).map_err(|e| e.to_string())
            }
            _ => Err("missing job field".to_string()),
        };

        match decoded {
            Ok(job) => {
                debug!("{} job {} from stream", action, job.job_id);
                Some(job)
            }
            Err(e) => {
                warn!("Failed to parse job payload {}: {}", entry.id, e);
                // Ack the malformed message to prevent reprocessing
                self.ack(&entry.id).await.ok();
                None
            }
        }
    }

    /// Increment retry count for a job.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;

        let key = retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        // Set TTL to 24 hours
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    /// Get max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

fn retry_key(message_id: &str) -> String {
    format!("vidiox:retry:{}", message_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "vidiox:jobs");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_pending, 100);
    }

    #[test]
    fn test_retry_key_is_namespaced() {
        assert_eq!(retry_key("1700000000000-0"), "vidiox:retry:1700000000000-0");
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let config = QueueConfig {
            redis_url: "not a url".to_string(),
            ..QueueConfig::default()
        };
        assert!(JobQueue::new(config).is_err());
    }
}
