//! Trait definitions for the generation module.

use async_trait::async_trait;

use super::error::GenerationError;

/// Image bytes returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl GeneratedImage {
    /// File extension matching the content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// A remote text-to-image backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Generates one image for `prompt` with the given model.
    async fn invoke(&self, prompt: &str, model_id: &str)
        -> Result<GeneratedImage, GenerationError>;
}
