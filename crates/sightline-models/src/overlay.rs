//! Normalized display records published to the presentation layer.
//!
//! Exactly one [`OverlayRecord`] exists per raw detection; ordering is
//! preserved from the model output and nothing is merged or de-duplicated.
//! All geometry is floored to integer display units.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::detection::RawDetection;

/// One normalized object detection, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRecord {
    pub label: String,
    /// Confidence in [0, 1].
    pub score: f32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// One normalized pose keypoint, keyed by part name in [`OverlayRecord::Pose`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosePoint {
    pub label: String,
    pub left: i32,
    pub top: i32,
    /// Confidence in [0, 1].
    pub score: f32,
}

/// A normalized detection in either supported form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverlayRecord {
    Object(DisplayRecord),
    /// Part-name → point mapping for one estimated pose.
    Pose(HashMap<String, PosePoint>),
}

impl OverlayRecord {
    /// The object-form record, if this is one.
    pub fn as_object(&self) -> Option<&DisplayRecord> {
        match self {
            OverlayRecord::Object(rec) => Some(rec),
            OverlayRecord::Pose(_) => None,
        }
    }

    /// The pose-form mapping, if this is one.
    pub fn as_pose(&self) -> Option<&HashMap<String, PosePoint>> {
        match self {
            OverlayRecord::Object(_) => None,
            OverlayRecord::Pose(points) => Some(points),
        }
    }
}

/// Normalize raw model output into display records.
///
/// Geometry is floored to integers; order is preserved; one record per raw
/// detection.
pub fn normalize(raw: Vec<RawDetection>) -> Vec<OverlayRecord> {
    raw.into_iter().map(normalize_one).collect()
}

fn normalize_one(det: RawDetection) -> OverlayRecord {
    match det {
        RawDetection::Object { score, class, bbox } => OverlayRecord::Object(DisplayRecord {
            label: class,
            score,
            left: bbox[0].floor() as i32,
            top: bbox[1].floor() as i32,
            width: bbox[2].floor() as i32,
            height: bbox[3].floor() as i32,
        }),
        RawDetection::Pose { keypoints } => {
            let points = keypoints
                .into_iter()
                .map(|kp| {
                    (
                        kp.part.clone(),
                        PosePoint {
                            label: kp.part,
                            left: kp.position.x.floor() as i32,
                            top: kp.position.y.floor() as i32,
                            score: kp.score,
                        },
                    )
                })
                .collect();
            OverlayRecord::Pose(points)
        }
    }
}
