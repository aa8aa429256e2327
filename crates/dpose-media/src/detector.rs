//! Pose detector seam.
//!
//! Detectors report one body per frame as a fixed-order list of landmarks
//! in normalized frame coordinates. Mapping to named pixel-space keypoints
//! happens downstream.

use std::sync::Arc;

use crate::error::MediaResult;
use crate::frame::RgbFrame;

/// One landmark as reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLandmark {
    /// X in normalized frame coordinates (0.0 = left, 1.0 = right)
    pub x: f32,
    /// Y in normalized frame coordinates (0.0 = top, 1.0 = bottom)
    pub y: f32,
    /// Detector-relative depth
    pub z: f32,
    /// Visibility probability, when the model provides one
    pub visibility: Option<f32>,
}

impl RawLandmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: Option<f32>) -> Self {
        Self { x, y, z, visibility }
    }
}

/// Landmarks for the single body found in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPose {
    /// Landmarks in detector index order
    pub landmarks: Vec<RawLandmark>,
    /// Body presence score (0.0 to 1.0)
    pub score: f32,
}

/// Per-frame single-person pose detector.
pub trait PoseDetector: Send + Sync {
    /// Detect a body in an RGB frame; `None` when the model sees no one.
    fn detect(&self, frame: &RgbFrame) -> MediaResult<Option<RawPose>>;
}

impl<D: PoseDetector + ?Sized> PoseDetector for Arc<D> {
    fn detect(&self, frame: &RgbFrame) -> MediaResult<Option<RawPose>> {
        (**self).detect(frame)
    }
}
