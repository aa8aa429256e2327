//! Analysis configuration.

use std::time::Duration;

use crate::classifier::{ClassifierThresholds, RuleSet};

/// Settings for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Upper bound on frames processed per video
    pub max_frames: usize,
    /// Minimum detector presence score for a frame to count as detected
    pub min_confidence: f32,
    /// Wall-clock budget; the summary covers frames processed before it ran out
    pub timeout: Option<Duration>,
    /// Rule set used to label frames
    pub rule_set: RuleSet,
    /// Classifier thresholds
    pub thresholds: ClassifierThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_frames: 600,
            min_confidence: 0.5,
            timeout: None,
            rule_set: RuleSet::MultiLabel,
            thresholds: ClassifierThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_frames: std::env::var("ANALYSIS_MAX_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_frames),
            min_confidence: std::env::var("ANALYSIS_MIN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_confidence),
            timeout: std::env::var("ANALYSIS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs),
            rule_set: std::env::var("ANALYSIS_RULE_SET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rule_set),
            thresholds: defaults.thresholds,
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_set = rule_set;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
