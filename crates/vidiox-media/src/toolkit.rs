//! The media operations the pipeline depends on.

use async_trait::async_trait;
use std::path::Path;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegRunner, ToolPaths};
use crate::encode::encode_rendition;
use crate::error::MediaResult;
use crate::probe::probe_video;
use crate::thumbnail::extract_thumbnail;
use vidiox_models::{EncodingProfile, VideoInfo};

/// Probe, thumbnail and encode operations over an input file.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Read stream metadata of `input`.
    async fn probe(&self, input: &Path) -> MediaResult<VideoInfo>;

    /// Write a single-frame JPEG taken at `timestamp` to `output`.
    async fn extract_thumbnail(&self, input: &Path, output: &Path, timestamp: &str)
        -> MediaResult<()>;

    /// Encode one rendition of `input` to `output`.
    async fn encode(&self, input: &Path, output: &Path, profile: &EncodingProfile)
        -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    tools: ToolPaths,
    timeout_secs: Option<u64>,
    runner: FfmpegRunner,
}

impl FfmpegToolkit {
    /// Create a toolkit; `timeout_secs` bounds every single tool invocation.
    pub fn new(tools: ToolPaths, timeout_secs: Option<u64>) -> Self {
        let mut runner = FfmpegRunner::new(tools.ffmpeg.clone());
        if let Some(secs) = timeout_secs {
            runner = runner.with_timeout(secs);
        }

        Self {
            tools,
            timeout_secs,
            runner,
        }
    }

    /// Resolve both executables, failing if either is missing.
    pub fn verify(&self) -> MediaResult<()> {
        check_ffmpeg(&self.tools.ffmpeg)?;
        check_ffprobe(&self.tools.ffprobe)?;
        Ok(())
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, input: &Path) -> MediaResult<VideoInfo> {
        probe_video(&self.tools.ffprobe, input, self.timeout_secs).await
    }

    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        timestamp: &str,
    ) -> MediaResult<()> {
        extract_thumbnail(&self.runner, input, output, timestamp).await
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> MediaResult<()> {
        encode_rendition(&self.runner, input, output, profile).await
    }
}
