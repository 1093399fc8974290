//! Thumbnail extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use vidiox_models::encoding::THUMBNAIL_QUALITY;

/// Build the command that grabs one frame at `timestamp` as a JPEG.
pub fn thumbnail_command(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timestamp: &str,
) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .output_seek(timestamp)
        .single_frame()
        .image_quality(THUMBNAIL_QUALITY)
}

/// Extract a single-frame thumbnail from a video file.
pub async fn extract_thumbnail(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timestamp: &str,
) -> MediaResult<()> {
    runner
        .run(&thumbnail_command(video_path, output_path, timestamp))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidiox_models::encoding::THUMBNAIL_TIMESTAMP;

    #[test]
    fn test_thumbnail_arguments() {
        let args = thumbnail_command(
            "/tmp/uploads/v1_original.mp4",
            "/tmp/processed/v1_thumbnail.jpg",
            THUMBNAIL_TIMESTAMP,
        )
        .build_args();

        assert_eq!(
            args,
            [
                "-i",
                "/tmp/uploads/v1_original.mp4",
                "-ss",
                "00:00:01",
                "-vframes",
                "1",
                "-q:v",
                "2",
                "-y",
                "/tmp/processed/v1_thumbnail.jpg",
            ]
        );
    }
}
