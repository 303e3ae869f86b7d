//! FFmpeg CLI wrapper for frame extraction.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution
//! - FFprobe-based input validation
//! - Lazy, ordered extraction of video frames as JPEG images

pub mod command;
pub mod error;
pub mod extract;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extract::{FfmpegFrameOpener, Frame, FrameEncoding, FrameOpener, FrameSource};
pub use probe::{probe_video, VideoInfo};
