//! The ingestion pipeline.
//!
//! Orchestrates decode -> fetch -> split -> store for one notification
//! and reduces whatever happens to a single `Outcome`. No fault escapes
//! this boundary; the endpoint adapter only ever sees structured
//! outcomes. All state (work dir, fetched file, frame source) is
//! invocation-local and dropped when `run` returns.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{info, warn};

use fsplit_media::FrameOpener;
use fsplit_storage::{ObjectStore, StorageError};

use crate::naming::frame_key;
use crate::notification::{decode_notification, SourceDescriptor};
use crate::outcome::{Outcome, PipelineError};
use crate::retry::{retry_transient, RetryConfig};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Destination bucket for extracted frames.
    pub frames_bucket: String,
    /// Retry policy for the source fetch.
    pub fetch_retry: RetryConfig,
    /// Retry policy for each frame write.
    pub write_retry: RetryConfig,
}

impl PipelineConfig {
    /// Create a config with default retry policies.
    pub fn new(frames_bucket: impl Into<String>) -> Self {
        Self {
            frames_bucket: frames_bucket.into(),
            fetch_retry: RetryConfig::new("fetch_source"),
            write_retry: RetryConfig::new("write_frame"),
        }
    }
}

/// Splits uploaded videos into frames and fans them out to storage.
pub struct FramePipeline {
    store: Arc<dyn ObjectStore>,
    opener: Arc<dyn FrameOpener>,
    config: PipelineConfig,
}

impl FramePipeline {
    /// Create a new pipeline over the given store and frame opener.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        opener: Arc<dyn FrameOpener>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            opener,
            config,
        }
    }

    /// Process one notification payload to a terminal outcome.
    pub async fn run(&self, raw: &[u8]) -> Outcome {
        // Step 1: decode. Rejection has no side effects.
        let descriptor = match decode_notification(raw) {
            Ok(d) => d,
            Err(e) => {
                warn!("Rejected notification: {}", e);
                return Outcome::Failure(PipelineError::InvalidNotification(e));
            }
        };

        info!(
            "Splitting s3://{}/{} into {}",
            descriptor.bucket, descriptor.key, self.config.frames_bucket
        );

        // Step 2: fetch the source object.
        let video = match self.fetch_source(&descriptor).await {
            Ok(bytes) => bytes,
            Err(e) => return Outcome::Failure(e),
        };

        // Invocation-local work dir; dropped (and deleted) on return.
        let workdir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => return Outcome::Failure(PipelineError::Fetch(StorageError::Io(e))),
        };
        let video_path = workdir.path().join(source_file_name(&descriptor.key));
        if let Err(e) = tokio::fs::write(&video_path, &video).await {
            return Outcome::Failure(PipelineError::Fetch(StorageError::Io(e)));
        }
        drop(video);

        // Steps 3-6: decode and fan out.
        self.split_and_store(&descriptor, &video_path).await
    }

    async fn fetch_source(&self, descriptor: &SourceDescriptor) -> Result<Vec<u8>, PipelineError> {
        let result = retry_transient(
            &self.config.fetch_retry,
            StorageError::is_transient,
            || self.store.get_object(&descriptor.bucket, &descriptor.key),
        )
        .await;

        result.map_err(|e| match e {
            StorageError::NotFound(_) | StorageError::AccessDenied(_) => {
                PipelineError::SourceUnavailable(e)
            }
            _ => PipelineError::Fetch(e),
        })
    }

    async fn split_and_store(&self, descriptor: &SourceDescriptor, video_path: &Path) -> Outcome {
        // Step 3: open the video. Unreadable/corrupt input stops here.
        let mut source = match self.opener.open(video_path).await {
            Ok(s) => s,
            Err(e) => return Outcome::Failure(PipelineError::Decode(e)),
        };

        // Step 4: write frames in strictly increasing ordinal order. A
        // failed write stops extraction; skipping a frame and carrying
        // on would leave an ordinal gap behind a later success.
        let mut frames_written: u32 = 0;
        loop {
            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if frames_written == 0 => {
                    return Outcome::Failure(PipelineError::Decode(e));
                }
                Err(e) => {
                    return Outcome::PartialFailure {
                        frames_written,
                        error: PipelineError::Decode(e),
                    };
                }
            };

            let key = frame_key(&descriptor.key, frame.ordinal, frame.encoding);
            let content_type = frame.encoding.content_type();

            let write = retry_transient(
                &self.config.write_retry,
                StorageError::is_transient,
                || {
                    self.store.put_object(
                        &self.config.frames_bucket,
                        &key,
                        frame.data.clone(),
                        content_type,
                    )
                },
            )
            .await;

            if let Err(e) = write {
                return Outcome::PartialFailure {
                    frames_written,
                    error: PipelineError::Write(e),
                };
            }
            frames_written += 1;
        }

        // Step 5: an empty result is indistinguishable from a latent
        // decoder bug, so it surfaces as a failure.
        if frames_written == 0 {
            return Outcome::Failure(PipelineError::NoFrames);
        }

        info!(
            "Stored {} frames for s3://{}/{}",
            frames_written, descriptor.bucket, descriptor.key
        );
        Outcome::Success {
            frames: frames_written,
        }
    }
}

/// Local file name for the fetched source, keeping its extension so
/// ffmpeg can sniff the container format.
fn source_file_name(key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    if name.is_empty() {
        "source".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use fsplit_media::{Frame, FrameEncoding, FrameSource, MediaError, MediaResult};
    use fsplit_storage::StorageResult;

    /// In-memory object store with call counters and scripted failures.
    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
        get_calls: AtomicU32,
        put_calls: AtomicU32,
        /// Fail every get with this error kind.
        get_failure: Mutex<Option<GetFailure>>,
        /// Fail the Nth put (0-based) permanently.
        fail_put_at: Mutex<Option<u32>>,
        /// Fail this many puts transiently before succeeding.
        transient_put_failures: AtomicU32,
    }

    enum GetFailure {
        NotFound,
        AccessDenied,
        Transient,
    }

    impl MemoryStore {
        fn with_object(bucket: &str, key: &str, data: &[u8]) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert((bucket.into(), key.into()), data.to_vec());
            store
        }

        fn keys_in(&self, bucket: &str) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(b, _)| b == bucket)
                .map(|(_, k)| k.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(failure) = self.get_failure.lock().unwrap().as_ref() {
                return Err(match failure {
                    GetFailure::NotFound => StorageError::not_found(format!("{}/{}", bucket, key)),
                    GetFailure::AccessDenied => StorageError::access_denied("denied"),
                    GetFailure::Transient => StorageError::transient("timeout"),
                });
            }

            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, key)))
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            data: Vec<u8>,
            _content_type: &str,
        ) -> StorageResult<()> {
            let call = self.put_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(fail_at) = *self.fail_put_at.lock().unwrap() {
                if call >= fail_at {
                    return Err(StorageError::access_denied("bucket policy"));
                }
            }

            if self
                .transient_put_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::transient("503"));
            }

            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), data);
            Ok(())
        }
    }

    /// Frame opener that yields scripted frames regardless of input.
    struct FakeOpener {
        frames: Vec<Vec<u8>>,
        fail_open: bool,
    }

    impl FakeOpener {
        fn with_frames(count: usize) -> Self {
            Self {
                frames: (0..count).map(|i| vec![i as u8; 4]).collect(),
                fail_open: false,
            }
        }

        fn failing() -> Self {
            Self {
                frames: Vec::new(),
                fail_open: true,
            }
        }
    }

    #[async_trait]
    impl FrameOpener for FakeOpener {
        async fn open(&self, _path: &Path) -> MediaResult<Box<dyn FrameSource>> {
            if self.fail_open {
                return Err(MediaError::invalid_video("moov atom not found"));
            }
            Ok(Box::new(FakeSource {
                frames: self.frames.clone(),
                next: 0,
            }))
        }
    }

    struct FakeSource {
        frames: Vec<Vec<u8>>,
        next: usize,
    }

    #[async_trait]
    impl FrameSource for FakeSource {
        async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
            let Some(data) = self.frames.get(self.next) else {
                return Ok(None);
            };
            let frame = Frame {
                ordinal: self.next as u32,
                data: data.clone(),
                encoding: FrameEncoding::Jpeg,
            };
            self.next += 1;
            Ok(Some(frame))
        }
    }

    fn fast_config() -> PipelineConfig {
        let mut config = PipelineConfig::new("match-frames");
        config.fetch_retry = config.fetch_retry.with_base_delay(Duration::from_millis(1));
        config.write_retry = config.write_retry.with_base_delay(Duration::from_millis(1));
        config
    }

    fn pipeline(store: Arc<MemoryStore>, opener: FakeOpener) -> FramePipeline {
        FramePipeline::new(store, Arc::new(opener), fast_config())
    }

    fn envelope(bucket: &str, key: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "detail-type": "Object Created",
            "detail": {"bucket": {"name": bucket}, "object": {"key": key}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_writes_all_frames_at_deterministic_keys() {
        let store = Arc::new(MemoryStore::with_object("src", "games/2024-01-01.mp4", b"video"));
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(3));

        let outcome = pipeline.run(&envelope("src", "games/2024-01-01.mp4")).await;

        assert!(matches!(outcome, Outcome::Success { frames: 3 }));
        assert_eq!(
            store.keys_in("match-frames"),
            vec![
                "games/2024-01-01/frame-0000.jpg",
                "games/2024-01-01/frame-0001.jpg",
                "games/2024-01-01/frame-0002.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(MemoryStore::with_object("src", "match.mp4", b"video"));
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(2));
        let raw = envelope("src", "match.mp4");

        assert!(matches!(pipeline.run(&raw).await, Outcome::Success { frames: 2 }));
        let first = store.objects.lock().unwrap().clone();

        assert!(matches!(pipeline.run(&raw).await, Outcome::Success { frames: 2 }));
        let second = store.objects.lock().unwrap().clone();

        // same keys, same content, no duplicates
        assert_eq!(first, second);
        assert_eq!(store.keys_in("match-frames").len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_envelope_has_no_side_effects() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(3));

        let outcome = pipeline.run(b"{\"unexpected\": true}").await;

        assert!(matches!(
            outcome,
            Outcome::Failure(PipelineError::InvalidNotification(_))
        ));
        assert!(!outcome.is_retryable());
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_unavailable_without_retry() {
        let store = Arc::new(MemoryStore::default());
        *store.get_failure.lock().unwrap() = Some(GetFailure::NotFound);
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(1));

        let outcome = pipeline.run(&envelope("src", "gone.mp4")).await;

        assert!(matches!(
            outcome,
            Outcome::Failure(PipelineError::SourceUnavailable(_))
        ));
        // NotFound is not transient; exactly one fetch attempt
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_access_denied_source_is_unavailable() {
        let store = Arc::new(MemoryStore::default());
        *store.get_failure.lock().unwrap() = Some(GetFailure::AccessDenied);
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(1));

        let outcome = pipeline.run(&envelope("src", "locked.mp4")).await;
        assert!(matches!(
            outcome,
            Outcome::Failure(PipelineError::SourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_transient_fetch_exhausts_retries_then_fails() {
        let store = Arc::new(MemoryStore::default());
        *store.get_failure.lock().unwrap() = Some(GetFailure::Transient);
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(1));

        let outcome = pipeline.run(&envelope("src", "flaky.mp4")).await;

        assert!(matches!(outcome, Outcome::Failure(PipelineError::Fetch(_))));
        assert!(outcome.is_retryable());
        // initial attempt + 3 retries (default policy)
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_corrupt_video_is_decode_failure() {
        let store = Arc::new(MemoryStore::with_object("src", "bad.mp4", b"not video"));
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::failing());

        let outcome = pipeline.run(&envelope("src", "bad.mp4")).await;

        assert!(matches!(outcome, Outcome::Failure(PipelineError::Decode(_))));
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_frames_is_failure_not_success() {
        let store = Arc::new(MemoryStore::with_object("src", "empty.mp4", b"video"));
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(0));

        let outcome = pipeline.run(&envelope("src", "empty.mp4")).await;

        assert!(matches!(outcome, Outcome::Failure(PipelineError::NoFrames)));
        assert!(outcome.is_retryable());
    }

    #[tokio::test]
    async fn test_write_failure_stops_extraction_with_partial_outcome() {
        let store = Arc::new(MemoryStore::with_object("src", "match.mp4", b"video"));
        // frames 0 and 1 succeed, frame 2 fails permanently
        *store.fail_put_at.lock().unwrap() = Some(2);
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(5));

        let outcome = pipeline.run(&envelope("src", "match.mp4")).await;

        match outcome {
            Outcome::PartialFailure {
                frames_written,
                error: PipelineError::Write(_),
            } => assert_eq!(frames_written, 2),
            other => panic!("expected partial failure, got {:?}", other),
        }

        // no frame with ordinal >= 2 was written
        assert_eq!(
            store.keys_in("match-frames"),
            vec!["match/frame-0000.jpg", "match/frame-0001.jpg"]
        );
    }

    #[tokio::test]
    async fn test_transient_write_is_retried_to_success() {
        let store = Arc::new(MemoryStore::with_object("src", "match.mp4", b"video"));
        store.transient_put_failures.store(2, Ordering::SeqCst);
        let pipeline = pipeline(Arc::clone(&store), FakeOpener::with_frames(2));

        let outcome = pipeline.run(&envelope("src", "match.mp4")).await;

        assert!(matches!(outcome, Outcome::Success { frames: 2 }));
        assert_eq!(store.keys_in("match-frames").len(), 2);
        // 2 transient failures + 2 eventual successes... plus the retry
        // of the first frame: 2 failed + 1 ok for frame 0, 1 ok for frame 1
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_source_file_name_keeps_extension() {
        assert_eq!(source_file_name("games/2024-01-01.mp4"), "2024-01-01.mp4");
        assert_eq!(source_file_name("plain.mov"), "plain.mov");
        assert_eq!(source_file_name("trailing/"), "source");
    }
}
