//! Analysis driver: decode → detect → normalize → classify, then summarize.
//!
//! A run is synchronous and strictly sequential. Callers on an async
//! runtime should move it onto a blocking thread.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use dpose_media::{FrameSource, PoseDetector, RawPose, RgbFrame, VideoOpener};
use dpose_models::{FrameKeypoints, PerFrameResult, VideoSummary};

use crate::aggregate::summarize;
use crate::classifier::Classifier;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::normalizer::normalize;
use crate::smoothing::{filled_count, forward_fill};

/// Frame rate assumed when the source does not report a usable one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Shared flag for stopping a run from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// Video-level summary returned to callers
    pub summary: VideoSummary,
    /// Per-frame labels, index-aligned with `keypoints`
    pub per_frame: Vec<PerFrameResult>,
    /// Keypoints after forward fill
    pub keypoints: Vec<Option<FrameKeypoints>>,
    /// Frames with a real detection
    pub detected_frames: usize,
    /// Frames whose keypoints were carried forward from an earlier frame
    pub filled_frames: usize,
    /// Whether the run stopped early on its wall-clock budget
    pub timed_out: bool,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// Runs the pose pipeline over videos opened by `O` with detector `D`.
pub struct Analyzer<O, D> {
    opener: O,
    detector: D,
    classifier: Classifier,
    config: AnalysisConfig,
    cancellation: CancellationFlag,
}

impl<O, D> Analyzer<O, D>
where
    O: VideoOpener,
    D: PoseDetector,
{
    pub fn new(opener: O, detector: D, config: AnalysisConfig) -> Self {
        let classifier = Classifier::new(config.rule_set).with_thresholds(config.thresholds);
        Self {
            opener,
            detector,
            classifier,
            config,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Attach a cancellation flag checked before every frame.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Analyze with the configured frame cap and confidence.
    pub fn analyze(&self, path: &Path) -> AnalysisResult<AnalysisOutput> {
        self.analyze_with(path, self.config.max_frames, self.config.min_confidence)
    }

    /// Analyze at most `max_frames` frames of the video at `path`.
    ///
    /// Fails only when the source cannot be opened or the run is cancelled;
    /// frames without a usable detection just carry no labels.
    pub fn analyze_with(
        &self,
        path: &Path,
        max_frames: usize,
        min_confidence: f32,
    ) -> AnalysisResult<AnalysisOutput> {
        let start = Instant::now();

        let mut source = self
            .opener
            .open(path, max_frames)
            .map_err(|e| AnalysisError::source_unavailable(path, e))?;
        let fps = resolve_fps(source.fps());

        info!(
            path = %path.display(),
            fps,
            max_frames,
            rule_set = %self.classifier.rule_set,
            "Starting pose analysis"
        );

        let mut keypoints: Vec<Option<FrameKeypoints>> = Vec::new();
        let mut per_frame: Vec<PerFrameResult> = Vec::new();
        let mut detected_frames = 0;
        let mut timed_out = false;

        while per_frame.len() < max_frames {
            if self.cancellation.is_cancelled() {
                warn!(path = %path.display(), frames = per_frame.len(), "Analysis cancelled");
                return Err(AnalysisError::Cancelled);
            }

            if let Some(limit) = self.config.timeout {
                if start.elapsed() >= limit {
                    warn!(
                        path = %path.display(),
                        frames = per_frame.len(),
                        timeout_secs = limit.as_secs_f64(),
                        "Analysis timed out, summarizing frames processed so far"
                    );
                    timed_out = true;
                    break;
                }
            }

            let index = per_frame.len();
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if index == 0 => {
                    return Err(AnalysisError::source_unavailable(path, e));
                }
                Err(e) => {
                    warn!(frame = index, error = %e, "Decode failed, ending stream early");
                    break;
                }
            };

            let raw = self.detect(&frame, index, min_confidence);
            let frame_keypoints = normalize(raw.as_ref(), frame.height, frame.width);
            let labels = self.classifier.classify(frame_keypoints.as_ref());

            if frame_keypoints.is_some() {
                detected_frames += 1;
            }
            trace!(frame = index, ?labels, "Classified frame");

            keypoints.push(frame_keypoints);
            per_frame.push(PerFrameResult::new(index as f64 / fps, labels));
        }

        let filled_frames = filled_count(&keypoints);
        let keypoints = forward_fill(&keypoints);
        let summary = summarize(per_frame.len(), fps, &per_frame);
        let elapsed = start.elapsed();

        info!(
            path = %path.display(),
            frames = summary.total_frames,
            detected = detected_frames,
            filled = filled_frames,
            labels = summary.total_labels(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Pose analysis complete"
        );

        Ok(AnalysisOutput {
            summary,
            per_frame,
            keypoints,
            detected_frames,
            filled_frames,
            timed_out,
            elapsed,
        })
    }

    /// Run the detector on one frame; failures and weak detections are misses.
    fn detect(&self, frame: &RgbFrame, index: usize, min_confidence: f32) -> Option<RawPose> {
        match self.detector.detect(frame) {
            Ok(Some(pose)) if pose.score >= min_confidence => Some(pose),
            Ok(Some(pose)) => {
                debug!(frame = index, score = pose.score, "Detection below confidence");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(frame = index, error = %e, "Pose detection failed, treating frame as a miss");
                None
            }
        }
    }
}

/// Analyze a video and return only its summary.
pub fn analyze<O, D>(
    opener: O,
    detector: D,
    path: &Path,
    max_frames: usize,
    min_confidence: f32,
) -> AnalysisResult<VideoSummary>
where
    O: VideoOpener,
    D: PoseDetector,
{
    Analyzer::new(opener, detector, AnalysisConfig::default())
        .analyze_with(path, max_frames, min_confidence)
        .map(|output| output.summary)
}

fn resolve_fps(reported: Option<f64>) -> f64 {
    match reported {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ => DEFAULT_FPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use dpose_media::{FfmpegDecoder, MediaError, MediaResult, RawLandmark};
    use dpose_models::{Landmark, PoseLabel};

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    /// Frames tag their index in the first byte so the fake detector can
    /// script per-frame outcomes.
    fn tagged_frame(index: usize) -> RgbFrame {
        RgbFrame {
            width: WIDTH,
            height: HEIGHT,
            data: vec![index as u8],
        }
    }

    struct FakeSource {
        fps: Option<f64>,
        frames: VecDeque<MediaResult<RgbFrame>>,
    }

    impl FrameSource for FakeSource {
        fn fps(&self) -> Option<f64> {
            self.fps
        }

        fn next_frame(&mut self) -> MediaResult<Option<RgbFrame>> {
            self.frames.pop_front().transpose()
        }
    }

    /// Opens a fixed number of frames; frame `fail_at` fails to decode.
    #[derive(Clone, Default)]
    struct FakeOpener {
        frames: usize,
        fps: Option<f64>,
        fail_at: Option<usize>,
        unavailable: bool,
    }

    impl FakeOpener {
        fn frames(frames: usize) -> Self {
            Self {
                frames,
                fps: Some(30.0),
                ..Default::default()
            }
        }
    }

    impl VideoOpener for FakeOpener {
        type Source = FakeSource;

        fn open(&self, path: &Path, max_frames: usize) -> MediaResult<FakeSource> {
            if self.unavailable {
                return Err(MediaError::FileNotFound(path.to_path_buf()));
            }
            let frames = (0..self.frames.min(max_frames))
                .map(|i| {
                    if Some(i) == self.fail_at {
                        Err(MediaError::ffmpeg_failed("corrupt packet", None, Some(1)))
                    } else {
                        Ok(tagged_frame(i))
                    }
                })
                .collect();
            Ok(FakeSource {
                fps: self.fps,
                frames,
            })
        }
    }

    #[derive(Clone)]
    enum Outcome {
        Pose(RawPose),
        Miss,
        Fail,
    }

    /// Replays outcomes by frame index; frames past the script are misses.
    struct ScriptedDetector {
        script: Vec<Outcome>,
    }

    impl ScriptedDetector {
        fn repeat(outcome: Outcome, count: usize) -> Self {
            Self {
                script: vec![outcome; count],
            }
        }
    }

    impl PoseDetector for ScriptedDetector {
        fn detect(&self, frame: &RgbFrame) -> MediaResult<Option<RawPose>> {
            let index = frame.data[0] as usize;
            match self.script.get(index) {
                Some(Outcome::Pose(pose)) => Ok(Some(pose.clone())),
                Some(Outcome::Fail) => Err(MediaError::detection_failed("session error")),
                Some(Outcome::Miss) | None => Ok(None),
            }
        }
    }

    fn hands_up_pose(score: f32) -> RawPose {
        let mut landmarks = vec![RawLandmark::new(0.5, 0.5, 0.0, Some(0.9)); Landmark::COUNT];
        let mut set = |lm: Landmark, x: f32, y: f32| {
            landmarks[lm.index()] = RawLandmark::new(x, y, 0.0, Some(0.9));
        };
        set(Landmark::LeftShoulder, 0.55, 0.4);
        set(Landmark::RightShoulder, 0.45, 0.4);
        set(Landmark::LeftWrist, 0.55, 0.2);
        set(Landmark::RightWrist, 0.45, 0.2);
        RawPose { landmarks, score }
    }

    fn video() -> PathBuf {
        PathBuf::from("/videos/dance.mp4")
    }

    fn analyzer(opener: FakeOpener, detector: ScriptedDetector) -> Analyzer<FakeOpener, ScriptedDetector> {
        Analyzer::new(opener, detector, AnalysisConfig::default())
    }

    #[test]
    fn test_sequences_are_index_aligned() {
        let detector = ScriptedDetector::repeat(Outcome::Pose(hands_up_pose(0.9)), 10);
        let output = analyzer(FakeOpener::frames(10), detector)
            .analyze(&video())
            .unwrap();

        assert_eq!(output.summary.total_frames, 10);
        assert_eq!(output.per_frame.len(), 10);
        assert_eq!(output.keypoints.len(), 10);
        assert_eq!(output.summary.count(PoseLabel::HandsUp), 10);
        assert_eq!(output.detected_frames, 10);

        let times: Vec<f64> = output.summary.sample_frames.iter().map(|s| s.time_s).collect();
        let expected: Vec<f64> = [0, 2, 4, 6, 8].iter().map(|&i| i as f64 / 30.0).collect();
        assert_eq!(times, expected);
    }

    #[test]
    fn test_misses_are_filled_but_not_labelled() {
        let pose = Outcome::Pose(hands_up_pose(0.9));
        let detector = ScriptedDetector {
            script: vec![pose.clone(), Outcome::Miss, Outcome::Miss, pose],
        };
        let output = analyzer(FakeOpener::frames(4), detector)
            .analyze(&video())
            .unwrap();

        assert!(output.keypoints.iter().all(Option::is_some));
        assert_eq!(output.keypoints[1], output.keypoints[0]);
        assert_eq!(output.detected_frames, 2);
        assert_eq!(output.filled_frames, 2);

        let labels: Vec<usize> = output.per_frame.iter().map(|r| r.labels.len()).collect();
        assert_eq!(labels, vec![1, 0, 0, 1]);
        assert_eq!(output.summary.count(PoseLabel::HandsUp), 2);
    }

    #[test]
    fn test_leading_misses_stay_empty() {
        let detector = ScriptedDetector {
            script: vec![Outcome::Miss, Outcome::Pose(hands_up_pose(0.9))],
        };
        let output = analyzer(FakeOpener::frames(2), detector)
            .analyze(&video())
            .unwrap();
        assert!(output.keypoints[0].is_none());
        assert!(output.keypoints[1].is_some());
        assert_eq!(output.filled_frames, 0);
    }

    #[test]
    fn test_frame_cap() {
        let detector = ScriptedDetector::repeat(Outcome::Miss, 0);
        let output = analyzer(FakeOpener::frames(20), detector)
            .analyze_with(&video(), 5, 0.5)
            .unwrap();
        assert_eq!(output.summary.total_frames, 5);
        assert!(output.summary.pose_counts.is_empty());
    }

    #[test]
    fn test_unavailable_source() {
        let opener = FakeOpener {
            unavailable: true,
            ..FakeOpener::frames(3)
        };
        let result = analyzer(opener, ScriptedDetector::repeat(Outcome::Miss, 0)).analyze(&video());
        assert!(matches!(
            result,
            Err(AnalysisError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_fps_fallback() {
        for reported in [None, Some(0.0), Some(f64::NAN), Some(-24.0)] {
            let opener = FakeOpener {
                fps: reported,
                ..FakeOpener::frames(2)
            };
            let output = analyzer(opener, ScriptedDetector::repeat(Outcome::Miss, 0))
                .analyze(&video())
                .unwrap();
            assert_eq!(output.summary.fps, DEFAULT_FPS);
            assert!((output.per_frame[1].timestamp_s - 1.0 / 30.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_low_confidence_is_a_miss() {
        let detector = ScriptedDetector {
            script: vec![
                Outcome::Pose(hands_up_pose(0.3)),
                Outcome::Pose(hands_up_pose(0.8)),
            ],
        };
        let output = analyzer(FakeOpener::frames(2), detector)
            .analyze_with(&video(), 600, 0.5)
            .unwrap();
        assert_eq!(output.detected_frames, 1);
        assert!(output.per_frame[0].labels.is_empty());
        assert_eq!(output.per_frame[1].labels, vec![PoseLabel::HandsUp]);
    }

    #[test]
    fn test_detector_error_is_a_miss() {
        let detector = ScriptedDetector {
            script: vec![Outcome::Fail, Outcome::Pose(hands_up_pose(0.9))],
        };
        let output = analyzer(FakeOpener::frames(2), detector)
            .analyze(&video())
            .unwrap();
        assert_eq!(output.summary.total_frames, 2);
        assert_eq!(output.detected_frames, 1);
    }

    #[test]
    fn test_decode_error_ends_stream() {
        let opener = FakeOpener {
            fail_at: Some(3),
            ..FakeOpener::frames(8)
        };
        let output = analyzer(opener, ScriptedDetector::repeat(Outcome::Miss, 0))
            .analyze(&video())
            .unwrap();
        assert_eq!(output.summary.total_frames, 3);
    }

    #[test]
    fn test_decode_error_on_first_frame_is_unavailable() {
        let opener = FakeOpener {
            fail_at: Some(0),
            ..FakeOpener::frames(8)
        };
        let result = analyzer(opener, ScriptedDetector::repeat(Outcome::Miss, 0)).analyze(&video());
        assert!(matches!(
            result,
            Err(AnalysisError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_cancellation() {
        let flag = CancellationFlag::new();
        flag.cancel();
        let result = analyzer(FakeOpener::frames(3), ScriptedDetector::repeat(Outcome::Miss, 0))
            .with_cancellation(flag)
            .analyze(&video());
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
    }

    #[test]
    fn test_timeout_returns_partial_summary() {
        let config = AnalysisConfig::default().with_timeout(Duration::ZERO);
        let output = Analyzer::new(
            FakeOpener::frames(5),
            ScriptedDetector::repeat(Outcome::Miss, 0),
            config,
        )
        .analyze(&video())
        .unwrap();
        assert!(output.timed_out);
        assert_eq!(output.summary.total_frames, 0);
        assert!(output.summary.sample_frames.is_empty());
    }

    #[test]
    fn test_empty_video_summarizes() {
        let output = analyzer(FakeOpener::frames(0), ScriptedDetector::repeat(Outcome::Miss, 0))
            .analyze(&video())
            .unwrap();
        assert_eq!(output.summary.total_frames, 0);
        assert!(output.summary.pose_counts.is_empty());
    }

    #[test]
    fn test_exclusive_rule_set() {
        let config = AnalysisConfig::default().with_rule_set(crate::RuleSet::Exclusive);
        let output = Analyzer::new(
            FakeOpener::frames(2),
            ScriptedDetector {
                script: vec![Outcome::Pose(hands_up_pose(0.9)), Outcome::Miss],
            },
            config,
        )
        .analyze(&video())
        .unwrap();

        // Elbows collapse onto the body center, so the arms read as crossed.
        assert_eq!(output.per_frame[0].labels, vec![PoseLabel::ArmsCrossed]);
        assert!(output.per_frame[1].labels.is_empty());
    }

    #[test]
    fn test_summary_only_entry_point() {
        let detector = ScriptedDetector::repeat(Outcome::Pose(hands_up_pose(0.9)), 3);
        let summary = analyze(FakeOpener::frames(3), detector, &video(), 600, 0.5).unwrap();
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.sample_frames.len(), 3);
    }

    #[test]
    fn test_ffmpeg_missing_file_is_unavailable() {
        let result = analyze(
            FfmpegDecoder::new(),
            ScriptedDetector::repeat(Outcome::Miss, 0),
            Path::new("/nonexistent/clip.mp4"),
            10,
            0.5,
        );
        assert!(matches!(
            result,
            Err(AnalysisError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_ffmpeg_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp4");
        std::fs::write(&path, b"not really an mp4").unwrap();

        let result = analyze(
            FfmpegDecoder::new(),
            ScriptedDetector::repeat(Outcome::Miss, 0),
            &path,
            10,
            0.5,
        );
        assert!(matches!(
            result,
            Err(AnalysisError::SourceUnavailable { .. })
        ));
    }

    #[test]
    #[ignore = "requires ffmpeg and a sample video at DPOSE_SAMPLE_VIDEO"]
    fn test_real_video_decodes() {
        let Ok(path) = std::env::var("DPOSE_SAMPLE_VIDEO") else {
            return;
        };
        let output = Analyzer::new(
            FfmpegDecoder::new(),
            ScriptedDetector::repeat(Outcome::Miss, 0),
            AnalysisConfig::default().with_max_frames(30),
        )
        .analyze(Path::new(&path))
        .unwrap();
        assert!(output.summary.total_frames > 0);
        assert!(output.summary.total_frames <= 30);
    }
}
