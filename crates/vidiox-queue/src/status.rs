//! Job status records.
//!
//! A record lives in the Redis hash `job:<id>` with the fields `status`,
//! `message`, `updated_at` and, once completed, `data`. Creation metadata
//! (`video_id`, `original_filename`, `created_at`) is written at acceptance.
//! Every write refreshes the TTL of the whole hash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};
use vidiox_models::{JobResult, JobStatus, JobView, TranscodeJob};

/// Lifetime of a job record after its last write.
pub const JOB_STATUS_TTL_SECS: u64 = 3600;

/// Persistence for job records.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Write every present field of `view` and refresh the TTL.
    async fn put(&self, view: &JobView) -> QueueResult<()>;

    /// Read a record, `None` if absent or expired.
    async fn get(&self, job_id: &str) -> QueueResult<Option<JobView>>;

    /// Check the backing store answers.
    async fn ping(&self) -> QueueResult<()>;
}

fn record_key(job_id: &str) -> String {
    format!("job:{}", job_id)
}

/// Status store over Redis hashes.
pub struct RedisStatusStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisStatusStore {
    pub fn new(redis_url: &str, ttl_secs: u64) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl_secs })
    }

    /// Create from `REDIS_URL` and `JOB_STATUS_TTL_SECS`.
    pub fn from_env() -> QueueResult<Self> {
        let url = std::env::var("REDIS_URL")
            .map_err(|_| QueueError::unavailable("REDIS_URL not set"))?;
        let ttl = std::env::var("JOB_STATUS_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ttl| *ttl > 0)
            .unwrap_or(JOB_STATUS_TTL_SECS);
        Self::new(&url, ttl)
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn put(&self, view: &JobView) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let key = record_key(&view.job_id);
        let fields = to_fields(view)?;

        redis::pipe()
            .atomic()
            .hset_multiple(&key, fields.as_slice())
            .ignore()
            .expire(&key, self.ttl_secs as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = %view.job_id, status = %view.status, "Stored job status");
        Ok(())
    }

    async fn get(&self, job_id: &str) -> QueueResult<Option<JobView>> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(record_key(job_id))
            .query_async(&mut conn)
            .await?;

        if fields.is_empty() {
            return Ok(None);
        }
        from_fields(job_id, &fields).map(Some)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

/// Hash fields for a record; absent optionals are left untouched.
fn to_fields(view: &JobView) -> QueueResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("status", view.status.as_str().to_string()),
        ("message", view.message.clone()),
        ("updated_at", view.updated_at.to_rfc3339()),
    ];

    if let Some(video_id) = &view.video_id {
        fields.push(("video_id", video_id.clone()));
    }
    if let Some(name) = &view.original_filename {
        fields.push(("original_filename", name.clone()));
    }
    if let Some(created_at) = &view.created_at {
        fields.push(("created_at", created_at.to_rfc3339()));
    }
    if let Some(data) = &view.data {
        fields.push(("data", serde_json::to_string(data)?));
    }

    Ok(fields)
}

fn parse_time(raw: &str) -> QueueResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| QueueError::invalid_record(format!("bad timestamp '{}': {}", raw, e)))
}

fn from_fields(job_id: &str, fields: &HashMap<String, String>) -> QueueResult<JobView> {
    let status = fields
        .get("status")
        .ok_or_else(|| QueueError::invalid_record("missing status"))?
        .parse::<JobStatus>()
        .map_err(QueueError::invalid_record)?;

    let updated_at = match fields.get("updated_at") {
        Some(raw) => parse_time(raw)?,
        None => return Err(QueueError::invalid_record("missing updated_at")),
    };

    let created_at = fields.get("created_at").map(|raw| parse_time(raw)).transpose()?;

    let data = fields
        .get("data")
        .map(|raw| serde_json::from_str::<JobResult>(raw))
        .transpose()?;

    Ok(JobView {
        job_id: job_id.to_string(),
        status,
        message: fields.get("message").cloned().unwrap_or_default(),
        updated_at,
        video_id: fields.get("video_id").cloned(),
        original_filename: fields.get("original_filename").cloned(),
        created_at,
        data,
    })
}

/// In-process status store.
///
/// Used by tests and by single-process setups without Redis; records do not
/// expire.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<String, JobView>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put(&self, view: &JobView) -> QueueResult<()> {
        let mut records = self.records.write().await;
        let merged = match records.remove(&view.job_id) {
            Some(existing) => JobView {
                video_id: view.video_id.clone().or(existing.video_id),
                original_filename: view.original_filename.clone().or(existing.original_filename),
                created_at: view.created_at.or(existing.created_at),
                data: view.data.clone().or(existing.data),
                ..view.clone()
            },
            None => view.clone(),
        };
        records.insert(view.job_id.clone(), merged);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> QueueResult<Option<JobView>> {
        Ok(self.records.read().await.get(job_id).cloned())
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}

/// Reads and writes job records, enforcing forward-only status changes.
///
/// Without a store, writes are logged and dropped and reads report the store
/// as unavailable.
#[derive(Clone)]
pub struct JobStatusTracker {
    store: Option<Arc<dyn StatusStore>>,
}

impl JobStatusTracker {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A tracker with no backing store.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Write the initial `queued` record for an accepted job.
    pub async fn create(&self, job: &TranscodeJob, message: &str) -> QueueResult<()> {
        let view = JobView {
            job_id: job.job_id.to_string(),
            status: JobStatus::Queued,
            message: message.to_string(),
            updated_at: Utc::now(),
            video_id: Some(job.video_id.to_string()),
            original_filename: Some(job.original_filename.clone()),
            created_at: Some(job.created_at),
            data: None,
        };
        self.write(view).await
    }

    /// Move a job to `status` with `message`, attaching `result` when given.
    ///
    /// A write that would regress the status, or leave a terminal state, is
    /// rejected with [`QueueError::StatusTransition`].
    pub async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: impl Into<String>,
        result: Option<JobResult>,
    ) -> QueueResult<()> {
        let message = message.into();
        let store = self.store_or_log(job_id, status, &message)?;

        if let Some(current) = store.get(job_id).await? {
            current.status.transition_to(status)?;
        }

        let view = JobView {
            job_id: job_id.to_string(),
            status,
            message,
            updated_at: Utc::now(),
            video_id: None,
            original_filename: None,
            created_at: None,
            data: if status == JobStatus::Completed { result } else { None },
        };
        store.put(&view).await
    }

    /// Current record of a job.
    pub async fn get_status(&self, job_id: &str) -> QueueResult<JobView> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| QueueError::unavailable("no status store configured"))?;

        match store.get(job_id).await {
            Ok(Some(view)) => Ok(view),
            Ok(None) => Err(QueueError::JobNotFound(job_id.to_string())),
            Err(e @ QueueError::InvalidRecord(_)) => Err(e),
            Err(e) => {
                warn!(job_id, error = %e, "Status store read failed");
                Err(QueueError::unavailable(e.to_string()))
            }
        }
    }

    /// Check the backing store answers.
    pub async fn ping(&self) -> QueueResult<()> {
        match &self.store {
            Some(store) => store.ping().await,
            None => Err(QueueError::unavailable("no status store configured")),
        }
    }

    async fn write(&self, view: JobView) -> QueueResult<()> {
        let store = self.store_or_log(&view.job_id, view.status, &view.message)?;
        store.put(&view).await
    }

    fn store_or_log(
        &self,
        job_id: &str,
        status: JobStatus,
        message: &str,
    ) -> QueueResult<&Arc<dyn StatusStore>> {
        self.store.as_ref().ok_or_else(|| {
            warn!(
                job_id,
                status = %status,
                status_message = message,
                "Job tracking unavailable, status not persisted"
            );
            QueueError::unavailable("no status store configured")
        })
    }
}
