//! Rule-based per-frame pose classification.
//!
//! Two independent rule sets are available:
//!
//! | Rule set | Labels | Coordinates |
//! |----------|--------|-------------|
//! | `multi_label` (default) | hands_up, t_pose, squat, step_left, step_right | pixels |
//! | `exclusive` | arms_crossed, hands_up, squat, side_sway, cross_step, neutral | normalized |
//!
//! The multi-label rules fire independently and may produce any subset.
//! The exclusive rules are a priority chain over elbow and knee angles and
//! always produce at least one label for a detected body.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use dpose_models::{FrameKeypoints, Keypoint, Landmark, PoseLabel};

use crate::geometry::{angle_at, angle_between, midpoint_x, shoulder_width};

/// Wrists must clear their shoulders by this many pixels.
pub const HANDS_UP_MARGIN_PX: f32 = 15.0;
/// Minimum wrist reach from the shoulder, as a fraction of shoulder width.
pub const T_POSE_REACH_RATIO: f32 = 0.7;
/// Maximum wrist drop from the shoulder, as a fraction of shoulder width.
pub const T_POSE_LEVEL_RATIO: f32 = 0.25;
/// Average knee angle (degrees) below which a squat is reported.
pub const SQUAT_KNEE_ANGLE_DEG: f32 = 120.0;
/// Ankle offset from hip center, as a fraction of shoulder width.
pub const STEP_OFFSET_RATIO: f32 = 0.4;
/// Scale for step detection when shoulders are not visible.
pub const FALLBACK_SHOULDER_WIDTH_PX: f32 = 100.0;
/// Added to shoulder width so coincident shoulders do not divide by zero.
pub const SHOULDER_WIDTH_EPSILON: f32 = 1e-6;

/// Both elbows tighter than this (degrees) reads as arms crossed.
pub const ARMS_CROSSED_ELBOW_DEG: f32 = 40.0;
/// Both elbows straighter than this (degrees) reads as arms raised.
pub const ARMS_RAISED_ELBOW_DEG: f32 = 150.0;
/// Either knee tighter than this (degrees) reads as a squat.
pub const EXCLUSIVE_SQUAT_KNEE_DEG: f32 = 100.0;
/// Horizontal shoulder offset (normalized units) for a side sway.
pub const SWAY_SHOULDER_OFFSET: f32 = 0.3;
/// Either knee tighter than this (degrees) with crossed arms adds a cross step.
pub const CROSS_STEP_KNEE_DEG: f32 = 120.0;

/// Which rule set to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Independent position and angle rules; zero or more labels.
    #[default]
    MultiLabel,
    /// Elbow-angle priority chain; falls back to `neutral`.
    Exclusive,
}

impl RuleSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSet::MultiLabel => "multi_label",
            RuleSet::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleSet {
    type Err = RuleSetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multi_label" | "multilabel" | "multi" => Ok(RuleSet::MultiLabel),
            "exclusive" => Ok(RuleSet::Exclusive),
            _ => Err(RuleSetParseError(s.to_string())),
        }
    }
}

/// Error parsing a rule set name.
#[derive(Debug, Error)]
#[error("Unknown rule set: {0}")]
pub struct RuleSetParseError(String);

/// Tunable thresholds for both rule sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    /// Pixels a wrist must rise above its shoulder
    pub hands_up_margin_px: f32,
    /// Wrist reach as a fraction of shoulder width
    pub t_pose_reach_ratio: f32,
    /// Wrist drop as a fraction of shoulder width
    pub t_pose_level_ratio: f32,
    /// Average knee angle in degrees
    pub squat_knee_angle_deg: f32,
    /// Ankle offset as a fraction of shoulder width
    pub step_offset_ratio: f32,
    /// Step scale in pixels when shoulders are missing
    pub fallback_shoulder_width_px: f32,
    /// Elbow angle in degrees (exclusive rules)
    pub arms_crossed_elbow_deg: f32,
    /// Elbow angle in degrees (exclusive rules)
    pub arms_raised_elbow_deg: f32,
    /// Knee angle in degrees (exclusive rules)
    pub exclusive_squat_knee_deg: f32,
    /// Shoulder x offset in normalized units (exclusive rules)
    pub sway_shoulder_offset: f32,
    /// Knee angle in degrees (exclusive rules)
    pub cross_step_knee_deg: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            hands_up_margin_px: HANDS_UP_MARGIN_PX,
            t_pose_reach_ratio: T_POSE_REACH_RATIO,
            t_pose_level_ratio: T_POSE_LEVEL_RATIO,
            squat_knee_angle_deg: SQUAT_KNEE_ANGLE_DEG,
            step_offset_ratio: STEP_OFFSET_RATIO,
            fallback_shoulder_width_px: FALLBACK_SHOULDER_WIDTH_PX,
            arms_crossed_elbow_deg: ARMS_CROSSED_ELBOW_DEG,
            arms_raised_elbow_deg: ARMS_RAISED_ELBOW_DEG,
            exclusive_squat_knee_deg: EXCLUSIVE_SQUAT_KNEE_DEG,
            sway_shoulder_offset: SWAY_SHOULDER_OFFSET,
            cross_step_knee_deg: CROSS_STEP_KNEE_DEG,
        }
    }
}

/// Stateless frame classifier bound to a rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    pub rule_set: RuleSet,
    pub thresholds: ClassifierThresholds,
}

impl Classifier {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            rule_set,
            thresholds: ClassifierThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ClassifierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Labels for one frame; empty when there is no detection.
    pub fn classify(&self, frame: Option<&FrameKeypoints>) -> Vec<PoseLabel> {
        classify(frame, self.rule_set, &self.thresholds)
    }
}

/// Labels for one frame under the given rule set.
pub fn classify(
    frame: Option<&FrameKeypoints>,
    rule_set: RuleSet,
    thresholds: &ClassifierThresholds,
) -> Vec<PoseLabel> {
    let Some(frame) = frame else {
        return Vec::new();
    };

    match rule_set {
        RuleSet::MultiLabel => classify_multi_label(frame, thresholds),
        RuleSet::Exclusive => classify_exclusive(frame, thresholds),
    }
}

/// Independent rules in pixel space, in fixed evaluation order.
pub fn classify_multi_label(frame: &FrameKeypoints, t: &ClassifierThresholds) -> Vec<PoseLabel> {
    let mut labels = Vec::new();

    let left_shoulder = frame.get(Landmark::LeftShoulder);
    let right_shoulder = frame.get(Landmark::RightShoulder);
    let left_wrist = frame.get(Landmark::LeftWrist);
    let right_wrist = frame.get(Landmark::RightWrist);
    let left_hip = frame.get(Landmark::LeftHip);
    let right_hip = frame.get(Landmark::RightHip);
    let left_knee = frame.get(Landmark::LeftKnee);
    let right_knee = frame.get(Landmark::RightKnee);
    let left_ankle = frame.get(Landmark::LeftAnkle);
    let right_ankle = frame.get(Landmark::RightAnkle);

    if let (Some(lw), Some(rw), Some(ls), Some(rs)) =
        (left_wrist, right_wrist, left_shoulder, right_shoulder)
    {
        if is_hands_up(lw, rw, ls, rs, t) {
            labels.push(PoseLabel::HandsUp);
        }
        if is_t_pose(lw, rw, ls, rs, t) {
            labels.push(PoseLabel::TPose);
        }
    }

    let knee_angles: Vec<f32> = [
        angle_at(left_hip, left_knee, left_ankle),
        angle_at(right_hip, right_knee, right_ankle),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !knee_angles.is_empty() {
        let average = knee_angles.iter().sum::<f32>() / knee_angles.len() as f32;
        if average < t.squat_knee_angle_deg {
            labels.push(PoseLabel::Squat);
        }
    }

    if let (Some(la), Some(ra), Some(hip_center)) =
        (left_ankle, right_ankle, midpoint_x(left_hip, right_hip))
    {
        let scale = shoulder_width(left_shoulder, right_shoulder)
            .unwrap_or(t.fallback_shoulder_width_px);
        let limit = t.step_offset_ratio * scale;

        if la.x_px - hip_center < -limit {
            labels.push(PoseLabel::StepLeft);
        }
        if ra.x_px - hip_center > limit {
            labels.push(PoseLabel::StepRight);
        }
    }

    labels
}

fn is_hands_up(
    lw: &Keypoint,
    rw: &Keypoint,
    ls: &Keypoint,
    rs: &Keypoint,
    t: &ClassifierThresholds,
) -> bool {
    // Image y grows downward.
    lw.y_px < ls.y_px - t.hands_up_margin_px && rw.y_px < rs.y_px - t.hands_up_margin_px
}

fn is_t_pose(
    lw: &Keypoint,
    rw: &Keypoint,
    ls: &Keypoint,
    rs: &Keypoint,
    t: &ClassifierThresholds,
) -> bool {
    let width = (ls.x_px - rs.x_px).abs() + SHOULDER_WIDTH_EPSILON;
    let reach = t.t_pose_reach_ratio * width;
    let level = t.t_pose_level_ratio * width;

    (lw.x_px - ls.x_px).abs() > reach
        && (rw.x_px - rs.x_px).abs() > reach
        && (lw.y_px - ls.y_px).abs() < level
        && (rw.y_px - rs.y_px).abs() < level
}

/// Elbow-angle priority chain over normalized coordinates.
///
/// Only whole-body detections are classified; a frame with fewer than
/// [`Landmark::COUNT`] points gets no labels.
pub fn classify_exclusive(frame: &FrameKeypoints, t: &ClassifierThresholds) -> Vec<PoseLabel> {
    if frame.len() < Landmark::COUNT {
        return Vec::new();
    }

    let point = |lm: Landmark| frame.get(lm).map(|k| k.normalized(frame.width, frame.height));
    let angle = |a: Landmark, b: Landmark, c: Landmark| {
        angle_between(point(a)?, point(b)?, point(c)?)
    };
    let below = |value: Option<f32>, limit: f32| value.is_some_and(|v| v < limit);
    let above = |value: Option<f32>, limit: f32| value.is_some_and(|v| v > limit);

    use Landmark::*;
    let left_elbow = angle(LeftShoulder, LeftElbow, LeftWrist);
    let right_elbow = angle(RightShoulder, RightElbow, RightWrist);
    let left_knee = angle(LeftHip, LeftKnee, LeftAnkle);
    let right_knee = angle(RightHip, RightKnee, RightAnkle);
    let shoulder_offset = match (point(LeftShoulder), point(RightShoulder)) {
        (Some(l), Some(r)) => Some((l.0 - r.0).abs()),
        _ => None,
    };

    let mut labels = Vec::new();
    if below(left_elbow, t.arms_crossed_elbow_deg) && below(right_elbow, t.arms_crossed_elbow_deg) {
        labels.push(PoseLabel::ArmsCrossed);
    } else if above(left_elbow, t.arms_raised_elbow_deg)
        && above(right_elbow, t.arms_raised_elbow_deg)
    {
        labels.push(PoseLabel::HandsUp);
    } else if below(left_knee, t.exclusive_squat_knee_deg)
        || below(right_knee, t.exclusive_squat_knee_deg)
    {
        labels.push(PoseLabel::Squat);
    } else if above(shoulder_offset, t.sway_shoulder_offset) {
        labels.push(PoseLabel::SideSway);
    }

    if labels.contains(&PoseLabel::ArmsCrossed)
        && (below(left_knee, t.cross_step_knee_deg) || below(right_knee, t.cross_step_knee_deg))
    {
        labels.push(PoseLabel::CrossStep);
    }

    if labels.is_empty() {
        labels.push(PoseLabel::Neutral);
    }

    labels
}
