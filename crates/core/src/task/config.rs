//! Orchestrator settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, DeliveryConfig, FormatPreferences, ProgressConfig};
use crate::converter::MediaConfig;
use crate::generation::GenerationConfig;
use crate::retry::RetryPolicy;

/// The parts of [`Config`] a request run needs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Parent of the per-request working directories.
    pub workspace_root: PathBuf,
    pub delivery: DeliveryConfig,
    pub formats: FormatPreferences,
    pub media: MediaConfig,
    pub retry: RetryPolicy,
    pub progress: ProgressConfig,
    pub generation: GenerationConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("courier"),
            delivery: DeliveryConfig::default(),
            formats: FormatPreferences::default(),
            media: MediaConfig::default(),
            retry: RetryPolicy::default(),
            progress: ProgressConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workspace_root: config.workspace.root.clone(),
            delivery: config.delivery.clone(),
            formats: config.formats.clone(),
            media: config.media.clone(),
            retry: config.retry.clone(),
            progress: config.progress.clone(),
            generation: config.generation.clone(),
        }
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_ceiling(mut self, ceiling_bytes: u64) -> Self {
        self.delivery.ceiling_bytes = ceiling_bytes;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.progress.throttle_interval_ms)
    }
}
