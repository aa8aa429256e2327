//! MediaPipe BlazePose landmark ONNX inference.
//!
//! Runs the full-body landmark model on a letterboxed copy of the whole
//! frame. The model expects `[1, 256, 256, 3]` RGB in `[0, 1]` and returns:
//! - a `[1, 195]` tensor: 39 points × (x, y, z, visibility, presence), with
//!   x/y in input-pixel units and visibility/presence as logits
//! - a `[1, 1]` body presence score
//!
//! Only the first 33 points are body landmarks; the remaining ones are
//! auxiliary ROI points and are not reported.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, RgbImage};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info, trace};

use crate::detector::{PoseDetector, RawLandmark, RawPose};
use crate::error::{MediaError, MediaResult};
use crate::frame::RgbFrame;

/// Body landmarks reported per pose.
const BODY_LANDMARKS: usize = 33;

/// Values per landmark in the model output.
const VALUES_PER_LANDMARK: usize = 5;

/// Configuration for the pose landmark model.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Square input size the model expects
    pub input_size: u32,
    /// Name of the landmark output tensor
    pub landmarks_output: String,
    /// Name of the presence score output tensor
    pub score_output: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: find_default_model_path()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_CANDIDATES[0])),
            input_size: 256,
            landmarks_output: "Identity".to_string(),
            score_output: "Identity_1".to_string(),
        }
    }
}

impl DetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("POSE_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            input_size: std::env::var("POSE_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.input_size),
            landmarks_output: std::env::var("POSE_LANDMARKS_OUTPUT")
                .unwrap_or(defaults.landmarks_output),
            score_output: std::env::var("POSE_SCORE_OUTPUT").unwrap_or(defaults.score_output),
        }
    }
}

/// Placement of the resized frame inside the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, input_size: u32) -> Self {
        let scale = input_size as f32 / width.max(height).max(1) as f32;
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((input_size as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((input_size as f32 - scaled_h) / 2.0).floor(),
        }
    }

    /// Map an input-pixel point back to normalized frame coordinates.
    fn to_frame_normalized(&self, x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
        let fx = (x - self.pad_x) / self.scale;
        let fy = (y - self.pad_y) / self.scale;
        (fx / width.max(1) as f32, fy / height.max(1) as f32)
    }
}

/// ONNX Runtime wrapper for the BlazePose landmark model.
pub struct OrtPoseDetector {
    session: Mutex<Session>,
    config: DetectorConfig,
}

impl OrtPoseDetector {
    /// Load the model described by `config`.
    pub fn new(config: DetectorConfig) -> MediaResult<Self> {
        if !config.model_path.exists() {
            return Err(MediaError::model_not_found(
                config.model_path.display().to_string(),
            ));
        }

        let session = Mutex::new(create_session(&config.model_path)?);
        info!(
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            "Pose landmark detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Letterbox the frame into an NHWC tensor normalized to `[0, 1]`.
    fn preprocess(&self, frame: &RgbFrame) -> MediaResult<(Value, Letterbox)> {
        let size = self.config.input_size;
        let letterbox = Letterbox::fit(frame.width, frame.height, size);

        let image: RgbImage = ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| MediaError::detection_failed("Frame buffer does not match dimensions"))?;

        let scaled_w = ((frame.width as f32 * letterbox.scale).round() as u32).clamp(1, size);
        let scaled_h = ((frame.height as f32 * letterbox.scale).round() as u32).clamp(1, size);
        let resized = imageops::resize(&image, scaled_w, scaled_h, FilterType::Triangle);

        let mut canvas: RgbImage = ImageBuffer::from_pixel(size, size, Rgb([0, 0, 0]));
        imageops::overlay(
            &mut canvas,
            &resized,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        let nhwc: Vec<f32> = canvas.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        let shape = vec![1usize, size as usize, size as usize, 3];
        let tensor = Tensor::from_array((shape, nhwc.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("ORT tensor: {e}")))?;

        Ok((tensor, letterbox))
    }

    /// Run inference, returning the raw landmark values and presence score.
    fn run_inference(&self, input: Value) -> MediaResult<(Vec<f32>, f32)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::detection_failed("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ORT run failed: {e}")))?;

        let landmarks = outputs
            .get(self.config.landmarks_output.as_str())
            .ok_or_else(|| {
                MediaError::detection_failed(format!(
                    "Missing {} tensor",
                    self.config.landmarks_output
                ))
            })?;
        let (_, landmark_data) = landmarks
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;
        let landmark_values: Vec<f32> = landmark_data.to_vec();

        let score = outputs
            .get(self.config.score_output.as_str())
            .ok_or_else(|| {
                MediaError::detection_failed(format!("Missing {} tensor", self.config.score_output))
            })?;
        let (_, score_data) = score
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;
        let raw_score = score_data.first().copied().unwrap_or(0.0);

        Ok((landmark_values, as_probability(raw_score)))
    }
}

impl PoseDetector for OrtPoseDetector {
    fn detect(&self, frame: &RgbFrame) -> MediaResult<Option<RawPose>> {
        let (input, letterbox) = self.preprocess(frame)?;
        let (values, score) = self.run_inference(input)?;

        if values.len() < BODY_LANDMARKS * VALUES_PER_LANDMARK {
            return Err(MediaError::detection_failed(format!(
                "Unexpected landmark output size: {}",
                values.len()
            )));
        }

        trace!(score, "Pose presence score");
        if score <= 0.0 {
            debug!("No body detected in frame");
            return Ok(None);
        }

        let landmarks = decode_landmarks(&values, &letterbox, frame.width, frame.height);
        Ok(Some(RawPose { landmarks, score }))
    }
}

/// Convert the flat model output into normalized frame landmarks.
fn decode_landmarks(
    values: &[f32],
    letterbox: &Letterbox,
    width: u32,
    height: u32,
) -> Vec<RawLandmark> {
    values
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(BODY_LANDMARKS)
        .map(|v| {
            let (x, y) = letterbox.to_frame_normalized(v[0], v[1], width, height);
            RawLandmark::new(x, y, v[2], Some(sigmoid(v[3])))
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Some exports emit the presence score as a logit, others as a probability.
fn as_probability(score: f32) -> f32 {
    if (0.0..=1.0).contains(&score) {
        score
    } else {
        sigmoid(score)
    }
}

/// Create an ONNX Runtime session on CPU.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::detection_failed(format!("ORT read model file: {e}")))?;

    Session::builder()
        .map_err(|e| MediaError::detection_failed(format!("ORT session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::detection_failed(format!("ORT opt level: {e}")))?
        .commit_from_memory(model_bytes.as_slice())
        .map_err(|e| MediaError::detection_failed(format!("ORT load model: {e}")))
}

const DEFAULT_MODEL_CANDIDATES: &[&str] = &[
    "./models/pose/pose_landmark_full.onnx",
    "/app/models/pose/pose_landmark_full.onnx",
];

/// Search common locations for the pose landmark model.
pub fn find_default_model_path() -> Option<PathBuf> {
    DEFAULT_MODEL_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
