//! Video-level summary from per-frame labels.

use std::collections::BTreeMap;

use dpose_models::{PerFrameResult, SampleFrame, VideoSummary};

/// Maximum number of sampled frames in a summary.
pub const MAX_SAMPLE_FRAMES: usize = 5;

/// Indices of the evenly spaced frame sample.
///
/// Steps by `max(1, total_frames / 5)` from frame 0 and keeps at most five
/// entries.
pub fn sample_indices(total_frames: usize) -> Vec<usize> {
    let stride = (total_frames / MAX_SAMPLE_FRAMES).max(1);
    (0..total_frames)
        .step_by(stride)
        .take(MAX_SAMPLE_FRAMES)
        .collect()
}

/// Build the summary for a completed run.
///
/// Sample timestamps are recomputed as `index / fps`.
pub fn summarize(total_frames: usize, fps: f64, results: &[PerFrameResult]) -> VideoSummary {
    let mut pose_counts = BTreeMap::new();
    for label in results.iter().flat_map(|r| r.labels.iter()) {
        *pose_counts.entry(*label).or_insert(0) += 1;
    }

    let sample_frames = sample_indices(total_frames)
        .into_iter()
        .filter_map(|i| {
            results.get(i).map(|r| SampleFrame {
                time_s: i as f64 / fps,
                labels: r.labels.clone(),
            })
        })
        .collect();

    VideoSummary {
        total_frames,
        fps,
        pose_counts,
        sample_frames,
    }
}
