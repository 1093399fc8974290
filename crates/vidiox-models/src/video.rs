//! Video identifiers and probe metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Properties of the input file, derived once per job from the probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Width in pixels of the first video stream
    pub width: u32,
    /// Height in pixels of the first video stream
    pub height: u32,
    /// Codec of the first video stream
    #[serde(rename = "codec")]
    pub codec_name: String,
    /// Container duration in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    /// Frame rate (fps)
    #[serde(rename = "fps")]
    pub frame_rate: f64,
    /// Codec of the first audio stream, if the file has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_info_wire_names() {
        let info = VideoInfo {
            width: 1920,
            height: 1080,
            codec_name: "h264".to_string(),
            duration_seconds: 12.5,
            frame_rate: 30.0,
            audio_codec: None,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["codec"], "h264");
        assert_eq!(json["fps"], 30.0);
        assert_eq!(json["duration"], 12.5);
        assert!(json.get("audio_codec").is_none());
    }
}
