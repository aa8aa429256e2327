//! Shared data models for the DancePose analyzer.
//!
//! This crate provides Serde-serializable types for:
//! - The 33-point body landmark vocabulary
//! - Per-frame keypoint maps in pixel space
//! - Pose labels produced by the frame classifier
//! - Per-frame results and the video-level summary

pub mod keypoint;
pub mod landmark;
pub mod pose_label;
pub mod summary;

// Re-export common types
pub use keypoint::{FrameKeypoints, Keypoint};
pub use landmark::{Landmark, LandmarkName, LandmarkParseError};
pub use pose_label::{PoseLabel, PoseLabelParseError};
pub use summary::{PerFrameResult, SampleFrame, VideoSummary};
