//! FFprobe video information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::command::stderr_tail;
use crate::error::{MediaError, MediaResult};
use vidiox_models::encoding::DEFAULT_FRAME_RATE;
use vidiox_models::VideoInfo;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

impl FfprobeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }
}

/// Probe a video file for information.
pub async fn probe_video(
    ffprobe: &Path,
    path: impl AsRef<Path>,
    timeout_secs: Option<u64>,
) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    debug!("Probing {}", path.display());

    let child = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FfprobeNotFound,
            _ => MediaError::Io(e),
        })?;

    let output = match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
            .await
            .map_err(|_| MediaError::Timeout(secs))??,
        None => child.wait_with_output().await?,
    };

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(stderr_tail(&output.stderr)),
        ));
    }

    parse_probe_output(&output.stdout)
}

/// Turn ffprobe's JSON report into [`VideoInfo`].
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.is("video"))
        .ok_or(MediaError::NoVideoStream)?;

    let audio_codec = probe
        .streams
        .iter()
        .find(|s| s.is("audio"))
        .and_then(|s| s.codec_name.clone());

    let duration_seconds = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .unwrap_or(0.0);

    let frame_rate = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(DEFAULT_FRAME_RATE);

    Ok(VideoInfo {
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        codec_name: video_stream.codec_name.clone().unwrap_or_default(),
        duration_seconds,
        frame_rate,
        audio_codec,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// Returns `None` for anything that is not a positive, finite rate.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}
