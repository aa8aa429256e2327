//! Pose labels emitted by the frame classifier.
//!
//! Two rule sets share this vocabulary:
//!
//! - multi-label rules: `hands_up`, `t_pose`, `squat`, `step_left`, `step_right`
//! - exclusive elbow-angle rules: `arms_crossed`, `hands_up`, `squat`,
//!   `side_sway`, `cross_step`, `neutral`

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Categorical tag describing a recognized body configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PoseLabel {
    /// Both wrists raised above the shoulders.
    HandsUp,
    /// Arms held out straight and level.
    TPose,
    /// Knees bent below the squat threshold.
    Squat,
    /// Left ankle displaced outward from the hip center.
    StepLeft,
    /// Right ankle displaced outward from the hip center.
    StepRight,
    /// Both elbows sharply bent (exclusive rules).
    ArmsCrossed,
    /// Shoulders strongly misaligned horizontally (exclusive rules).
    SideSway,
    /// Arms crossed while a knee is moderately bent (exclusive rules).
    CrossStep,
    /// No exclusive rule fired.
    Neutral,
}

impl PoseLabel {
    /// All labels.
    pub const ALL: &'static [PoseLabel] = &[
        PoseLabel::HandsUp,
        PoseLabel::TPose,
        PoseLabel::Squat,
        PoseLabel::StepLeft,
        PoseLabel::StepRight,
        PoseLabel::ArmsCrossed,
        PoseLabel::SideSway,
        PoseLabel::CrossStep,
        PoseLabel::Neutral,
    ];

    /// Returns the label tag as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoseLabel::HandsUp => "hands_up",
            PoseLabel::TPose => "t_pose",
            PoseLabel::Squat => "squat",
            PoseLabel::StepLeft => "step_left",
            PoseLabel::StepRight => "step_right",
            PoseLabel::ArmsCrossed => "arms_crossed",
            PoseLabel::SideSway => "side_sway",
            PoseLabel::CrossStep => "cross_step",
            PoseLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for PoseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PoseLabel {
    type Err = PoseLabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hands_up" => Ok(PoseLabel::HandsUp),
            "t_pose" | "tpose" => Ok(PoseLabel::TPose),
            "squat" => Ok(PoseLabel::Squat),
            "step_left" => Ok(PoseLabel::StepLeft),
            "step_right" => Ok(PoseLabel::StepRight),
            "arms_crossed" => Ok(PoseLabel::ArmsCrossed),
            "side_sway" => Ok(PoseLabel::SideSway),
            "cross_step" => Ok(PoseLabel::CrossStep),
            "neutral" => Ok(PoseLabel::Neutral),
            _ => Err(PoseLabelParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown pose label: {0}")]
pub struct PoseLabelParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tag_matches_as_str() {
        for label in PoseLabel::ALL {
            let json = serde_json::to_string(label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
            assert_eq!(label.as_str().parse::<PoseLabel>().unwrap(), *label);
        }
    }

    #[test]
    fn test_parse_unknown() {
        assert!("moonwalk".parse::<PoseLabel>().is_err());
        assert_eq!("T_POSE".parse::<PoseLabel>().unwrap(), PoseLabel::TPose);
    }
}
