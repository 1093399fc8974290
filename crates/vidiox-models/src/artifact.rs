//! Encoded outputs and the result payload of a completed job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::VideoInfo;

/// One successfully encoded rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedArtifact {
    /// Name of the profile that produced this file
    #[serde(rename = "quality")]
    pub profile_name: String,
    /// Output filename (namespaced by video ID)
    pub filename: String,
    /// Where the file was written
    #[serde(rename = "path")]
    pub local_path: PathBuf,
    /// File size in bytes
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Target video bitrate in bits/second
    #[serde(rename = "bitrate")]
    pub bitrate_bps: u64,
    /// Public URL, absent until (and unless) publication succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result payload attached to a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Renditions in ladder order
    #[serde(rename = "encoded_files")]
    pub artifacts: Vec<EncodedArtifact>,
    /// Public URL of the thumbnail, if one was produced and published
    pub thumbnail_url: Option<String>,
    /// Input duration in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    /// Probe metadata of the input
    pub video_info: VideoInfo,
}
