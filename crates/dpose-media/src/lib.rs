//! FFmpeg frame decoding and pose landmark detection.
//!
//! This crate provides:
//! - Video probing and raw RGB frame streaming through the FFmpeg CLI
//! - The [`FrameSource`] / [`VideoOpener`] seam for frame producers
//! - The [`PoseDetector`] seam and a BlazePose ONNX implementation

pub mod command;
pub mod decoder;
pub mod detector;
pub mod error;
pub mod frame;
pub mod probe;

#[cfg(feature = "onnx")]
pub mod pose_landmark;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use decoder::{FfmpegDecoder, FfmpegFrameSource};
pub use detector::{PoseDetector, RawLandmark, RawPose};
pub use error::{MediaError, MediaResult};
pub use frame::{FrameSource, RgbFrame, VideoOpener};
pub use probe::{probe_video, VideoInfo};

#[cfg(feature = "onnx")]
pub use pose_landmark::{find_default_model_path, DetectorConfig, OrtPoseDetector};
