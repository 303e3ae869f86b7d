//! Application state.

use std::sync::Arc;

use fsplit_media::FfmpegFrameOpener;
use fsplit_pipeline::{FramePipeline, PipelineConfig};
use fsplit_storage::{S3Config, S3ObjectStore};

use crate::alert::NoFramesAlert;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<FramePipeline>,
    pub http: reqwest::Client,
    pub no_frames_alert: Arc<NoFramesAlert>,
}

impl AppState {
    /// Create new application state.
    ///
    /// All configuration is resolved here, once, at startup; nothing
    /// reads the environment after this returns.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = S3ObjectStore::new(S3Config::from_env()?);
        let opener = FfmpegFrameOpener::new();

        let pipeline = FramePipeline::new(
            Arc::new(store),
            Arc::new(opener),
            PipelineConfig::new(config.frames_bucket.as_str()),
        );

        let no_frames_alert = NoFramesAlert::new(config.no_frames_alert_threshold);

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            http: reqwest::Client::new(),
            no_frames_alert: Arc::new(no_frames_alert),
        })
    }
}
