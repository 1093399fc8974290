//! Rendition ladder and encoder settings.

use serde::Serialize;

/// Video codec for every rendition (H.264)
pub const VIDEO_CODEC: &str = "libx264";
/// Audio codec for every rendition
pub const AUDIO_CODEC: &str = "aac";
/// Encoder preset
pub const PRESET: &str = "medium";
/// Constant Rate Factor
pub const CRF: u8 = 23;
/// Container flag moving the index to the front of the file
pub const FASTSTART_MOVFLAGS: &str = "+faststart";

/// Thumbnail generation settings
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:01";
/// Highest JPEG quality for `-q:v`
pub const THUMBNAIL_QUALITY: u8 = 2;

/// Frame rate assumed when the probe reports none we can use
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// One rung of the rendition ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodingProfile {
    /// Quality label, e.g. "720p"
    pub name: &'static str,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Target video bitrate in bits/second
    pub video_bitrate_bps: u64,
    /// Target audio bitrate in bits/second
    pub audio_bitrate_bps: u64,
    /// Output frame rate
    pub fps: u32,
}

impl EncodingProfile {
    /// Resolution as passed to `-s`, e.g. "1280x720".
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Video bitrate as passed to `-b:v`, e.g. "2500k".
    pub fn video_bitrate_arg(&self) -> String {
        kilobits(self.video_bitrate_bps)
    }

    /// Audio bitrate as passed to `-b:a`, e.g. "192k".
    pub fn audio_bitrate_arg(&self) -> String {
        kilobits(self.audio_bitrate_bps)
    }
}

fn kilobits(bps: u64) -> String {
    format!("{}k", bps / 1000)
}

/// The static ladder, in ascending resolution order.
pub const RENDITION_LADDER: [EncodingProfile; 5] = [
    EncodingProfile {
        name: "240p",
        width: 426,
        height: 240,
        video_bitrate_bps: 400_000,
        audio_bitrate_bps: 64_000,
        fps: 30,
    },
    EncodingProfile {
        name: "360p",
        width: 640,
        height: 360,
        video_bitrate_bps: 800_000,
        audio_bitrate_bps: 96_000,
        fps: 30,
    },
    EncodingProfile {
        name: "480p",
        width: 854,
        height: 480,
        video_bitrate_bps: 1_200_000,
        audio_bitrate_bps: 128_000,
        fps: 30,
    },
    EncodingProfile {
        name: "720p",
        width: 1280,
        height: 720,
        video_bitrate_bps: 2_500_000,
        audio_bitrate_bps: 192_000,
        fps: 30,
    },
    EncodingProfile {
        name: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate_bps: 5_000_000,
        audio_bitrate_bps: 256_000,
        fps: 30,
    },
];

/// Choose the renditions to produce for an input of the given height.
///
/// Every profile no taller than the input is kept, in ladder order. When none
/// qualifies (including an unknown height of 0) the single lowest profile is
/// returned, so the result is never empty for a non-empty ladder.
pub fn select_profiles(ladder: &[EncodingProfile], input_height: u32) -> Vec<EncodingProfile> {
    let selected: Vec<EncodingProfile> = ladder
        .iter()
        .filter(|p| p.height <= input_height)
        .copied()
        .collect();

    if !selected.is_empty() {
        return selected;
    }

    ladder
        .iter()
        .min_by_key(|p| p.height)
        .copied()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(profiles: &[EncodingProfile]) -> Vec<&'static str> {
        profiles.iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_full_hd_selects_whole_ladder() {
        let selected = select_profiles(&RENDITION_LADDER, 1080);
        assert_eq!(names(&selected), ["240p", "360p", "480p", "720p", "1080p"]);
    }

    #[test]
    fn test_sd_input_excludes_hd_profiles() {
        let selected = select_profiles(&RENDITION_LADDER, 480);
        assert_eq!(names(&selected), ["240p", "360p", "480p"]);
    }

    #[test]
    fn test_tiny_or_unknown_height_falls_back_to_lowest() {
        assert_eq!(names(&select_profiles(&RENDITION_LADDER, 144)), ["240p"]);
        assert_eq!(names(&select_profiles(&RENDITION_LADDER, 0)), ["240p"]);
    }

    #[test]
    fn test_fallback_uses_lowest_height_not_first_entry() {
        let ladder = [RENDITION_LADDER[3], RENDITION_LADDER[1]];
        assert_eq!(names(&select_profiles(&ladder, 100)), ["360p"]);
    }

    #[test]
    fn test_empty_ladder_selects_nothing() {
        assert!(select_profiles(&[], 1080).is_empty());
    }

    #[test]
    fn test_selection_matches_height_rule_for_all_heights() {
        for height in (0..=2400).step_by(7) {
            let selected = select_profiles(&RENDITION_LADDER, height);
            let expected: Vec<_> = RENDITION_LADDER
                .iter()
                .filter(|p| p.height <= height)
                .copied()
                .collect();

            if expected.is_empty() {
                assert_eq!(selected, vec![RENDITION_LADDER[0]], "height {height}");
            } else {
                assert_eq!(selected, expected, "height {height}");
            }
        }
    }

    #[test]
    fn test_profile_arguments() {
        let p720 = RENDITION_LADDER[3];
        assert_eq!(p720.resolution(), "1280x720");
        assert_eq!(p720.video_bitrate_arg(), "2500k");
        assert_eq!(p720.audio_bitrate_arg(), "192k");
        assert_eq!(RENDITION_LADDER[0].video_bitrate_arg(), "400k");
    }
}
