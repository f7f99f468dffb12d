//! Redraw-scheduling seam.
//!
//! The detection loop never publishes synchronously from a detect
//! completion; it waits on the host's [`RepaintScheduler`] first so rapid
//! successive results coalesce to the paint cadence.

use std::time::Duration;

use async_trait::async_trait;

/// Schedules a continuation just before the host's next repaint.
#[async_trait]
pub trait RepaintScheduler: Send + Sync + 'static {
    /// Resolve just before the next repaint. Fire-and-forget; no
    /// cancellation is required of implementations.
    async fn before_next_repaint(&self);
}

/// Scheduler for hosts without a paint cycle: yields once so the publish
/// lands on the next scheduler pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldScheduler;

#[async_trait]
impl RepaintScheduler for YieldScheduler {
    async fn before_next_repaint(&self) {
        tokio::task::yield_now().await;
    }
}

/// Fixed-cadence scheduler approximating a display refresh period.
#[derive(Debug, Clone, Copy)]
pub struct FrameScheduler {
    period: Duration,
}

impl FrameScheduler {
    /// Create a scheduler with the given frame period.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for FrameScheduler {
    /// Roughly 60 frames per second.
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

#[async_trait]
impl RepaintScheduler for FrameScheduler {
    async fn before_next_repaint(&self) {
        tokio::time::sleep(self.period).await;
    }
}
