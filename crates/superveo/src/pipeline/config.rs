use std::time::Duration;

use crate::client::{AspectRatio, GenerationRequest};
use crate::config::AppConfig;

use super::progress::{DEFAULT_INITIAL_PROGRESS, PROGRESS_CAP, PROGRESS_STEP};

/// Scheduling knobs for the batch orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wait between polls of one operation.
    pub poll_interval: Duration,
    pub initial_progress: u8,
    pub progress_step: u8,
    pub progress_cap: u8,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            initial_progress: DEFAULT_INITIAL_PROGRESS,
            progress_step: PROGRESS_STEP,
            progress_cap: PROGRESS_CAP,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            initial_progress: config.initial_progress,
            ..Self::default()
        }
    }
}

/// Per-batch generation parameters chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub aspect_ratio: AspectRatio,
    pub model: String,
}

impl GenerationParams {
    pub fn new(aspect_ratio: AspectRatio, model: impl Into<String>) -> Self {
        Self {
            aspect_ratio,
            model: model.into(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(AspectRatio::default(), config.default_model.clone())
    }

    pub fn request_for(&self, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            aspect_ratio: self.aspect_ratio,
            model: self.model.clone(),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}
