//! Pipeline outcome and error taxonomy.

use thiserror::Error;

use crate::notification::NotificationError;
use fsplit_media::MediaError;
use fsplit_storage::StorageError;

/// Failure classification for one pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or irrelevant notification. Non-retryable: the relay
    /// should not redeliver it.
    #[error("Invalid notification: {0}")]
    InvalidNotification(#[from] NotificationError),

    /// Source object missing or forbidden. Retrying within the
    /// invocation cannot help, but redelivery is harmless.
    #[error("Source object unavailable: {0}")]
    SourceUnavailable(StorageError),

    /// Source fetch failed after retries.
    #[error("Fetch failed: {0}")]
    Fetch(StorageError),

    /// The fetched file could not be decoded as video.
    #[error("Decode failed: {0}")]
    Decode(#[from] MediaError),

    /// The decoder opened the file but produced no frames.
    #[error("Video produced no frames")]
    NoFrames,

    /// A frame upload failed after retries.
    #[error("Frame write failed: {0}")]
    Write(StorageError),
}

/// Terminal result of one pipeline invocation.
///
/// Nothing is mutated after construction; this is the pipeline's only
/// return value, and the endpoint adapter's only input.
#[derive(Debug)]
pub enum Outcome {
    /// All frames extracted and stored.
    Success { frames: u32 },
    /// Frames `0..frames_written` were stored, then a write failed.
    /// Extraction stopped at the failure so no ordinal gap exists.
    PartialFailure {
        frames_written: u32,
        error: PipelineError,
    },
    /// Nothing usable was produced.
    Failure(PipelineError),
}

impl Outcome {
    /// Whether the relay should redeliver the notification.
    ///
    /// Everything except success and malformed input is worth a redo:
    /// idempotent destination naming makes a whole-invocation retry
    /// converge instead of duplicating frames.
    pub fn is_retryable(&self) -> bool {
        match self {
            Outcome::Success { .. } => false,
            Outcome::PartialFailure { .. } => true,
            Outcome::Failure(PipelineError::InvalidNotification(_)) => false,
            Outcome::Failure(_) => true,
        }
    }
}
