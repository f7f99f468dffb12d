//! Engine configuration.

use std::time::Duration;

use sightline_models::ReadyState;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between media readiness polls
    pub poll_interval: Duration,
    /// Readiness ordinal a video must reach before it is published
    pub video_ready_threshold: ReadyState,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            video_ready_threshold: ReadyState::HAS_DATA_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("SIGHTLINE_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            ),
            video_ready_threshold: std::env::var("SIGHTLINE_VIDEO_READY_ORDINAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .and_then(|n| ReadyState::from_ordinal(n).ok())
                .unwrap_or(ReadyState::HAS_DATA_THRESHOLD),
        }
    }
}
