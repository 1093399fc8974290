//! Shared data models for the VidioX transcoding service.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their identifiers
//! - Job status records and the status state machine
//! - The rendition ladder and profile selection
//! - Probe results and encoded artifacts
//! - Upload filename rules

pub mod artifact;
pub mod encoding;
pub mod job;
pub mod job_status;
pub mod upload;
pub mod video;

// Re-export common types
pub use artifact::{EncodedArtifact, JobResult};
pub use encoding::{select_profiles, EncodingProfile, RENDITION_LADDER};
pub use job::{upload_filename, JobId, TranscodeJob};
pub use job_status::{JobStatus, JobView, StatusTransitionError};
pub use upload::{
    is_allowed_extension, sanitize_filename, validate_upload_filename, UploadError,
    ALLOWED_EXTENSIONS,
};
pub use video::{VideoId, VideoInfo};
