//! Mock image generation backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::generation::{GeneratedImage, GenerationBackend, GenerationError};

/// Mock implementation of the GenerationBackend trait.
///
/// Each model has a queue of scripted results. An empty queue yields a small
/// PNG.
///
/// # Example
///
/// ```rust,ignore
/// use courier_core::testing::MockGenerationBackend;
///
/// let backend = MockGenerationBackend::new();
/// backend.script("stabilityai/stable-diffusion-xl-base-1.0", vec![
///     Err(GenerationError::transient(Some(429), "rate limited")),
/// ]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockGenerationBackend {
    scripts: Arc<RwLock<HashMap<String, VecDeque<Result<GeneratedImage, GenerationError>>>>>,
    invocations: Arc<RwLock<Vec<String>>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for the next invocations of `model_id`.
    pub fn script(&self, model_id: &str, results: Vec<Result<GeneratedImage, GenerationError>>) {
        self.scripts
            .write()
            .unwrap()
            .entry(model_id.to_string())
            .or_default()
            .extend(results);
    }

    /// Model ids invoked, in call order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.read().unwrap().clone()
    }

    /// A tiny image with a valid PNG signature.
    pub fn png() -> GeneratedImage {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 24]);
        GeneratedImage {
            bytes,
            content_type: "image/png".to_string(),
        }
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, _prompt: &str, model_id: &str) -> Result<GeneratedImage, GenerationError> {
        self.invocations.write().unwrap().push(model_id.to_string());
        let scripted = self
            .scripts
            .write()
            .unwrap()
            .get_mut(model_id)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| Ok(Self::png()))
    }
}
