//! Shared data models for the sightline perception pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Media kinds and video readiness ordinals
//! - Content identity (the "same thing as last time" value)
//! - Raw model detections (bounding-box and keypoint forms)
//! - Normalized display records published to the presentation layer

pub mod detection;
pub mod media;
pub mod overlay;

// Re-export common types
pub use detection::{Keypoint, Point, RawDetection};
pub use media::{ContentId, MediaKind, ReadyState, ReadyStateError};
pub use overlay::{normalize, DisplayRecord, OverlayRecord, PosePoint};
