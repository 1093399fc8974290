//! Job definitions for queue processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::VideoId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the string looks like an ID we would have issued.
    ///
    /// Used to reject garbage path parameters before touching the store.
    pub fn is_well_formed(s: &str) -> bool {
        Uuid::parse_str(s).is_ok()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An accepted transcode request.
///
/// This is the immutable half of a job: it is written to the queue once at
/// acceptance and never modified. The mutable half (status, message, result)
/// lives in the status store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Video ID, used to namespace every output filename
    pub video_id: VideoId,
    /// Uploaded source file
    pub input_path: PathBuf,
    /// Sanitized filename as supplied by the client
    pub original_filename: String,
    /// When the request was accepted
    pub created_at: DateTime<Utc>,
}

impl TranscodeJob {
    /// Create a new job for an already-persisted upload.
    pub fn new(
        video_id: VideoId,
        input_path: impl Into<PathBuf>,
        original_filename: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            input_path: input_path.into(),
            original_filename: original_filename.into(),
            created_at: Utc::now(),
        }
    }

    /// Filename of the rendition for a given profile.
    pub fn rendition_filename(&self, profile_name: &str) -> String {
        format!("{}_{}.mp4", self.video_id, profile_name)
    }

    /// Filename of the thumbnail still.
    pub fn thumbnail_filename(&self) -> String {
        format!("{}_thumbnail.jpg", self.video_id)
    }

    /// Path of the uploaded source.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }
}

/// Filename under which an upload is stored before processing.
pub fn upload_filename(video_id: &VideoId, extension: &str) -> String {
    format!("{}_original.{}", video_id, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_job_id_well_formed() {
        assert!(JobId::is_well_formed(JobId::new().as_str()));
        assert!(!JobId::is_well_formed("../../etc/passwd"));
        assert!(!JobId::is_well_formed(""));
    }

    #[test]
    fn test_output_filenames_are_namespaced() {
        let job = TranscodeJob::new(VideoId::from("abc"), "/tmp/uploads/abc_original.mp4", "clip.mp4");

        assert_eq!(job.rendition_filename("720p"), "abc_720p.mp4");
        assert_eq!(job.thumbnail_filename(), "abc_thumbnail.jpg");
        assert_eq!(upload_filename(&job.video_id, "mkv"), "abc_original.mkv");
    }

    #[test]
    fn test_transcode_job_serde_roundtrip() {
        let job = TranscodeJob::new(VideoId::new(), "/tmp/uploads/x.mp4", "x.mp4");
        let json = serde_json::to_string(&job).expect("serialize job");
        let decoded: TranscodeJob = serde_json::from_str(&json).expect("deserialize job");
        assert_eq!(decoded, job);
    }
}
