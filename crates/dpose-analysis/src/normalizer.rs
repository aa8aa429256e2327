//! Raw detector output to named pixel-space keypoints.

use dpose_media::RawPose;
use dpose_models::{FrameKeypoints, Keypoint, LandmarkName};

/// Convert one frame's detection into a keypoint map in pixel space.
///
/// Points past the named vocabulary keep their index as `lm_<index>`.
/// Missing visibility counts as fully visible.
pub fn normalize(raw: Option<&RawPose>, height: u32, width: u32) -> Option<FrameKeypoints> {
    let raw = raw?;
    let (w, h) = (width as f32, height as f32);

    let points = raw.landmarks.iter().enumerate().map(|(index, lm)| {
        let keypoint = Keypoint::new(lm.x * w, lm.y * h, lm.z, lm.visibility.unwrap_or(1.0));
        (LandmarkName::for_index(index), keypoint)
    });

    Some(FrameKeypoints::from_points(width, height, points))
}
