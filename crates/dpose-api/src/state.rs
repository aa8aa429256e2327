//! Application state.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use dpose_analysis::AnalysisConfig;
use dpose_media::{DetectorConfig, OrtPoseDetector, PoseDetector};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub analysis: AnalysisConfig,
    /// Loaded pose model; `None` when it failed to load
    pub detector: Option<Arc<dyn PoseDetector>>,
    /// Permits for concurrently running analyses
    pub analysis_slots: Arc<Semaphore>,
}

impl AppState {
    /// Create application state, loading the pose model from the environment.
    ///
    /// A missing or broken model does not stop the server; readiness reports
    /// it and uploads are refused until it is fixed.
    pub fn new(config: ApiConfig, analysis: AnalysisConfig) -> Self {
        let detector_config = DetectorConfig::from_env();
        let detector: Option<Arc<dyn PoseDetector>> =
            match OrtPoseDetector::new(detector_config.clone()) {
                Ok(detector) => Some(Arc::new(detector)),
                Err(e) => {
                    warn!(
                        model_path = %detector_config.model_path.display(),
                        error = %e,
                        "Pose model unavailable, analysis disabled"
                    );
                    None
                }
            };

        Self::with_detector(config, analysis, detector)
    }

    /// Create application state around an already-built detector.
    pub fn with_detector(
        config: ApiConfig,
        analysis: AnalysisConfig,
        detector: Option<Arc<dyn PoseDetector>>,
    ) -> Self {
        let slots = config.max_concurrent_analyses.max(1);
        info!(
            max_concurrent_analyses = slots,
            max_frames = analysis.max_frames,
            rule_set = %analysis.rule_set,
            detector_loaded = detector.is_some(),
            "Application state ready"
        );

        Self {
            config,
            analysis,
            detector,
            analysis_slots: Arc::new(Semaphore::new(slots)),
        }
    }
}
