//! API configuration.

use anyhow::Context;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Max request body size
    pub max_body_size: usize,
    /// Destination bucket for extracted frames
    pub frames_bucket: String,
    /// NoFrames occurrences before logs escalate to error level
    pub no_frames_alert_threshold: u32,
}

impl ApiConfig {
    /// Create config from environment variables.
    ///
    /// `FRAMES_BUCKET` is required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB; notifications are small
            frames_bucket: std::env::var("FRAMES_BUCKET").context("FRAMES_BUCKET not set")?,
            no_frames_alert_threshold: std::env::var("NO_FRAMES_ALERT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        })
    }
}
