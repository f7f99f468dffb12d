//! Raw model output types.
//!
//! A perception model yields one [`RawDetection`] per detected object or
//! pose, in source-pixel units. Normalization into display geometry lives
//! in [`crate::overlay`].

use serde::{Deserialize, Serialize};

/// A 2D point in source-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One named keypoint of an estimated pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Body-part name (e.g. "nose", "leftWrist").
    pub part: String,
    pub position: Point,
    /// Confidence in [0, 1].
    pub score: f32,
}

/// One labeled region-or-pose output from a perception model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDetection {
    /// Bounding-box form, from object detectors.
    Object {
        /// Confidence in [0, 1].
        score: f32,
        /// Class label (e.g. "chair").
        class: String,
        /// Bounding region as `[left, top, width, height]` in source pixels.
        bbox: [f32; 4],
    },
    /// Keypoint form, from pose estimators.
    Pose { keypoints: Vec<Keypoint> },
}

impl RawDetection {
    /// Build a bounding-box detection.
    pub fn object(class: impl Into<String>, score: f32, bbox: [f32; 4]) -> Self {
        Self::Object {
            score,
            class: class.into(),
            bbox,
        }
    }

    /// Build a keypoint-form detection.
    pub fn pose(keypoints: Vec<Keypoint>) -> Self {
        Self::Pose { keypoints }
    }
}
