//! Per-frame results and the video-level summary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pose_label::PoseLabel;

/// Labels computed for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerFrameResult {
    /// Frame index divided by the video frame rate
    pub timestamp_s: f64,
    /// Labels in the order the rules fired
    pub labels: Vec<PoseLabel>,
}

impl PerFrameResult {
    pub fn new(timestamp_s: f64, labels: Vec<PoseLabel>) -> Self {
        Self {
            timestamp_s,
            labels,
        }
    }
}

/// One entry of the evenly spaced frame sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleFrame {
    pub time_s: f64,
    pub labels: Vec<PoseLabel>,
}

/// Summary of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoSummary {
    /// Frames read from the source (bounded by the frame cap)
    pub total_frames: usize,
    /// Frame rate used for timestamps
    pub fps: f64,
    /// Occurrences of each label across all frames
    pub pose_counts: BTreeMap<PoseLabel, usize>,
    /// At most five frames, starting at frame 0
    pub sample_frames: Vec<SampleFrame>,
}

impl VideoSummary {
    /// Total number of labels across all frames.
    pub fn total_labels(&self) -> usize {
        self.pose_counts.values().sum()
    }

    /// Count for a single label (0 when it never fired).
    pub fn count(&self, label: PoseLabel) -> usize {
        self.pose_counts.get(&label).copied().unwrap_or(0)
    }
}
