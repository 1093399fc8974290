//! FFmpeg CLI wrapper for the transcoding pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with per-invocation timeouts and kill-on-drop
//! - FFprobe metadata extraction
//! - Thumbnail extraction and rendition encoding
//! - The `MediaToolkit` seam the pipeline is written against

pub mod command;
pub mod encode;
pub mod error;
pub mod probe;
pub mod thumbnail;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, ToolPaths};
pub use encode::encode_rendition;
pub use error::{MediaError, MediaResult};
pub use probe::{parse_frame_rate, parse_probe_output, probe_video};
pub use thumbnail::extract_thumbnail;
pub use toolkit::{FfmpegToolkit, MediaToolkit};
