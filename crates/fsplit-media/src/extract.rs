//! Frame extraction.
//!
//! Decodes a local video file into an ordered sequence of JPEG frames.
//! FFmpeg dumps the full image sequence into an invocation-local temp
//! directory; the frames are then streamed back lazily in presentation
//! order with zero-based ordinals. Dropping the source removes the
//! temp directory and everything in it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_video;

/// Image format of an extracted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEncoding {
    Jpeg,
}

impl FrameEncoding {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FrameEncoding::Jpeg => "jpg",
        }
    }

    /// MIME type for storage uploads.
    pub fn content_type(&self) -> &'static str {
        match self {
            FrameEncoding::Jpeg => "image/jpeg",
        }
    }
}

/// A single decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position in presentation order.
    pub ordinal: u32,
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Image format of `data`.
    pub encoding: FrameEncoding,
}

/// A finite sequence of frames in presentation order.
#[async_trait]
pub trait FrameSource: Send {
    /// Yield the next frame, or `None` when the sequence is exhausted.
    ///
    /// Ordinals are zero-based and strictly increasing across calls.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;
}

/// Opens a local video file as a frame sequence.
///
/// Re-opening the same file restarts the sequence from ordinal zero.
#[async_trait]
pub trait FrameOpener: Send + Sync {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>>;
}

/// FFmpeg-backed frame opener.
#[derive(Debug, Clone)]
pub struct FfmpegFrameOpener {
    /// JPEG quality passed to `-q:v` (2 is near-lossless).
    jpeg_quality: u8,
}

impl Default for FfmpegFrameOpener {
    fn default() -> Self {
        Self { jpeg_quality: 2 }
    }
}

impl FfmpegFrameOpener {
    /// Create an opener with the default JPEG quality.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the JPEG quality (2..=31, lower is better).
    pub fn with_jpeg_quality(mut self, q: u8) -> Self {
        self.jpeg_quality = q;
        self
    }
}

#[async_trait]
impl FrameOpener for FfmpegFrameOpener {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        // Reject corrupt/non-video input before spending decode time.
        let info = probe_video(path).await?;
        debug!(
            "Opening {} ({}x{} {} @ {:.2} fps)",
            path.display(),
            info.width,
            info.height,
            info.codec,
            info.fps
        );

        let workdir = TempDir::new()?;
        let pattern = workdir.path().join("frame-%04d.jpg");

        let cmd = FfmpegCommand::new(path, &pattern)
            .image_sequence()
            .jpeg_quality(self.jpeg_quality)
            .output_arg("-start_number")
            .output_arg("0")
            .log_level("error");

        FfmpegRunner::new().run(&cmd).await?;

        let mut files: Vec<PathBuf> = std::fs::read_dir(workdir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "jpg").unwrap_or(false))
            .collect();
        // %04d names sort lexicographically in frame order
        files.sort();

        info!("Extracted {} frames from {}", files.len(), path.display());

        Ok(Box::new(DumpedFrameSource {
            _workdir: workdir,
            files: files.into(),
            next_ordinal: 0,
        }))
    }
}

/// Streams frames back from an FFmpeg image dump.
struct DumpedFrameSource {
    /// Holds the temp directory alive until the sequence is dropped.
    _workdir: TempDir,
    files: VecDeque<PathBuf>,
    next_ordinal: u32,
}

#[async_trait]
impl FrameSource for DumpedFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        let Some(file) = self.files.pop_front() else {
            return Ok(None);
        };

        let data = tokio::fs::read(&file).await?;
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        Ok(Some(Frame {
            ordinal,
            data,
            encoding: FrameEncoding::Jpeg,
        }))
    }
}
