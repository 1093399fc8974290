//! Rendition encoding.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use vidiox_models::encoding::{AUDIO_CODEC, CRF, FASTSTART_MOVFLAGS, PRESET, VIDEO_CODEC};
use vidiox_models::EncodingProfile;

/// Build the H.264/AAC encode command for one ladder profile.
pub fn encode_command(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    profile: &EncodingProfile,
) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_codec(VIDEO_CODEC)
        .preset(PRESET)
        .crf(CRF)
        .size(profile.resolution())
        .video_bitrate(profile.video_bitrate_arg())
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(profile.audio_bitrate_arg())
        .frame_rate(profile.fps)
        .movflags(FASTSTART_MOVFLAGS)
}

/// Encode `input` into a single rendition at `output`.
pub async fn encode_rendition(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    profile: &EncodingProfile,
) -> MediaResult<()> {
    let output = output.as_ref();
    info!(
        profile = profile.name,
        output = %output.display(),
        "Encoding rendition"
    );

    runner.run(&encode_command(input, output, profile)).await
}
