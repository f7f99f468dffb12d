//! Media-readiness tracking and the single-flight detection loop.
//!
//! This crate provides:
//! - [`MediaElement`] / [`MediaSource`] traits over renderable media
//! - [`MediaTracker`]: polls a source and publishes a de-duplicated stream
//!   of ready-to-process media observations
//! - [`DetectionLoop`]: runs one detection pass per distinct
//!   (model, media) pair and publishes normalized overlay records,
//!   coalesced to the host's repaint cadence
//! - [`RepaintScheduler`], the redraw-scheduling seam
//! - Engine configuration and tracing bootstrap

pub mod config;
pub mod detection_loop;
pub mod error;
pub mod media;
pub mod repaint;
pub mod telemetry;
pub mod tracker;

pub use config::EngineConfig;
pub use detection_loop::{DetectionLoop, FaultStream, IdentityMode, LoopHandle, OverlayFeed};
pub use error::{EngineError, EngineResult};
pub use media::{MediaElement, MediaSource};
pub use repaint::{FrameScheduler, RepaintScheduler, YieldScheduler};
pub use telemetry::init_tracing;
pub use tracker::{MediaFeed, MediaPublisher, MediaTracker};

// The scope lives with the model registry so both crates share one
// teardown primitive.
pub use sightline_perception::Scope;
