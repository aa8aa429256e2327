//! Keypoints and per-frame keypoint maps.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::landmark::{Landmark, LandmarkName};

/// One detected landmark in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Keypoint {
    /// X coordinate in pixels (0 = left edge)
    pub x_px: f32,
    /// Y coordinate in pixels (0 = top edge, grows downward)
    pub y_px: f32,
    /// Detector-relative depth, unitless
    pub z: f32,
    /// Visibility score (0.0 to 1.0)
    pub visibility: f32,
}

impl Keypoint {
    /// Create a new keypoint.
    pub fn new(x_px: f32, y_px: f32, z: f32, visibility: f32) -> Self {
        Self {
            x_px,
            y_px,
            z,
            visibility,
        }
    }

    /// Fully visible keypoint at a pixel position with zero depth.
    pub fn at(x_px: f32, y_px: f32) -> Self {
        Self::new(x_px, y_px, 0.0, 1.0)
    }

    /// Position as normalized (0.0 to 1.0) frame coordinates.
    pub fn normalized(&self, width: u32, height: u32) -> (f32, f32) {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        (self.x_px / w, self.y_px / h)
    }
}

/// All keypoints detected for a single frame.
///
/// Built once by the landmark normalizer and read-only afterwards. A frame
/// without a detection is represented as `None` by callers, never as an
/// empty map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameKeypoints {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    points: BTreeMap<LandmarkName, Keypoint>,
}

impl FrameKeypoints {
    /// Build a keypoint map from named points.
    pub fn from_points<I>(width: u32, height: u32, points: I) -> Self
    where
        I: IntoIterator<Item = (LandmarkName, Keypoint)>,
    {
        Self {
            width,
            height,
            points: points.into_iter().collect(),
        }
    }

    /// Keypoint for a named landmark, if detected.
    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.points.get(&LandmarkName::Known(landmark))
    }

    /// Keypoint for any key, including synthetic `lm_<index>` names.
    pub fn get_named(&self, name: &LandmarkName) -> Option<&Keypoint> {
        self.points.get(name)
    }

    /// Iterate over all keypoints in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&LandmarkName, &Keypoint)> {
        self.points.iter()
    }

    /// Number of keypoints in the map.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
