//! Configuration for remote image generation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One model in the generation fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Backend model id, e.g. `stabilityai/stable-diffusion-xl-base-1.0`.
    pub id: String,
    /// Human readable name used in captions.
    pub label: String,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bearer token for the inference API.
    #[serde(default)]
    pub api_token: String,

    /// Timeout of one generation attempt in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Models in preference order.
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,
}

fn default_api_base() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("stabilityai/stable-diffusion-xl-base-1.0", "SDXL 1.0 (1024×1024)"),
        ModelSpec::new("SG161222/Realistic_Vision_V5.1", "Realistic Vision 5.1"),
        ModelSpec::new("runwayml/stable-diffusion-v1-5", "Stable Diffusion 1.5"),
    ]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_token: String::new(),
            timeout_secs: default_timeout(),
            models: default_models(),
        }
    }
}

impl GenerationConfig {
    /// Caption label for a model id, falling back to the id itself.
    pub fn label_for<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .map(|m| m.label.as_str())
            .unwrap_or(model_id)
    }
}
