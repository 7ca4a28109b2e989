//! Remote image generation with model fallback.
//!
//! The configured models form an ordered fallback chain run through the
//! [`crate::retry::FallbackEngine`]: models that are rate limited or still
//! loading are retried with backoff, and the first image produced wins.

mod config;
mod error;
mod huggingface;
mod traits;

pub use config::{GenerationConfig, ModelSpec};
pub use error::GenerationError;
pub use huggingface::{is_image_bytes, HuggingFaceBackend};
pub use traits::{GeneratedImage, GenerationBackend};

use crate::retry::{ChainFailure, ChainSuccess, FallbackEngine};

/// Runs `prompt` through `models` in order until one returns an image.
pub async fn generate_with_fallbacks(
    engine: &FallbackEngine,
    backend: &dyn GenerationBackend,
    prompt: &str,
    models: &[ModelSpec],
) -> Result<ChainSuccess<GeneratedImage>, ChainFailure> {
    engine
        .run("generate", models, |model| {
            let model_id = model.id.clone();
            async move {
                backend
                    .invoke(prompt, &model_id)
                    .await
                    .map_err(|e| e.to_attempt_error())
            }
        })
        .await
}
