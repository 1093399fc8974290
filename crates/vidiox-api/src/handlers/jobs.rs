//! Upload and job status handlers.

use std::path::Path;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use vidiox_models::{
    upload_filename, validate_upload_filename, JobId, JobStatus, JobView, TranscodeJob,
    UploadError, VideoId,
};
use vidiox_queue::QueueError;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

pub const MSG_JOB_STARTED: &str = "Video processing job started";

/// Multipart field carrying the upload.
const VIDEO_FIELD: &str = "video";

/// Response to an accepted upload.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub job_id: String,
    pub video_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Accept an upload and queue it for transcoding.
///
/// The `video` field is streamed to `<UPLOAD_DIR>/<video_id>_original.<ext>`;
/// other fields are ignored.
pub async fn process_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ProcessResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let (filename, extension) = validate_upload_filename(&raw_name)?;

        let video_id = VideoId::new();
        let input_path = state
            .config
            .upload_dir
            .join(upload_filename(&video_id, &extension));
        let size = save_field(field, &input_path).await?;

        let job = TranscodeJob::new(video_id, input_path, filename);
        return submit_job(&state, job, size).await.map(Json);
    }

    Err(UploadError::MissingFile.into())
}

/// Stream a multipart field to `path`, removing the file if anything fails.
async fn save_field(mut field: Field<'_>, path: &Path) -> ApiResult<u64> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    let result: ApiResult<()> = async {
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        discard_upload(path).await;
        return Err(e);
    }
    Ok(written)
}

/// Record the job as queued, then hand it to the queue.
async fn submit_job(state: &AppState, job: TranscodeJob, size: u64) -> ApiResult<ProcessResponse> {
    let job_id = job.job_id.to_string();

    // Written first so the worker's transitions always find a record.
    if let Err(e) = state.tracker.create(&job, MSG_JOB_STARTED).await {
        warn!(job_id = %job_id, "Job record not created: {}", e);
    }

    match state.jobs.submit(&job).await {
        Ok(message_id) => {
            info!(
                job_id = %job_id,
                video_id = %job.video_id,
                message_id = %message_id,
                bytes = size,
                "Job queued"
            );
            metrics::record_job_enqueued(size);
            Ok(ProcessResponse {
                job_id,
                video_id: job.video_id.to_string(),
                status: JobStatus::Queued,
                message: MSG_JOB_STARTED.to_string(),
            })
        }
        Err(e) => {
            warn!(job_id = %job_id, "Job not queued: {}", e);
            metrics::record_job_rejected(match &e {
                QueueError::QueueFull { .. } => "queue_full",
                _ => "queue_unavailable",
            });
            if let Err(status_err) = state
                .tracker
                .set_status(
                    &job_id,
                    JobStatus::Error,
                    format!("Unexpected error: job could not be queued: {}", e),
                    None,
                )
                .await
            {
                warn!(job_id = %job_id, "Failed to record rejection: {}", status_err);
            }
            // The upload stays: only a completed job removes its input.
            Err(ApiError::from_enqueue(&e))
        }
    }
}

async fn discard_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove upload {}: {}", path.display(), e);
    }
}

/// Current record of a job.
pub async fn get_job_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Json<JobView>> {
    if !state.tracker.is_available() {
        return Err(ApiError::TrackingUnavailable);
    }
    // IDs we issue are UUIDs; anything else cannot name a record.
    if !JobId::is_well_formed(&job_id) {
        return Err(ApiError::JobNotFound);
    }

    let view = state.tracker.get_status(&job_id).await?;
    Ok(Json(view))
}
