//! Frame-wise pose classification pipeline.
//!
//! This crate provides:
//! - Landmark normalization from detector output to pixel-space keypoints
//! - Joint angle and position geometry
//! - Rule-based per-frame labelling (multi-label and exclusive rule sets)
//! - Forward-fill smoothing and video-level summaries
//! - The [`Analyzer`] driver tying decoding, detection and classification together

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod geometry;
pub mod normalizer;
pub mod pipeline;
pub mod smoothing;

pub use aggregate::{sample_indices, summarize, MAX_SAMPLE_FRAMES};
pub use classifier::{classify, Classifier, ClassifierThresholds, RuleSet, RuleSetParseError};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use geometry::angle_at;
pub use normalizer::normalize;
pub use pipeline::{analyze, AnalysisOutput, Analyzer, CancellationFlag, DEFAULT_FPS};
pub use smoothing::forward_fill;
