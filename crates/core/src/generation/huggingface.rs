//! Hugging Face inference API backend.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::config::GenerationConfig;
use super::error::GenerationError;
use super::traits::{GeneratedImage, GenerationBackend};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";

/// Whether `bytes` start like a PNG, JPEG or WebP file.
pub fn is_image_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(PNG_MAGIC)
        || bytes.starts_with(JPEG_MAGIC)
        || (bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
}

fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(JPEG_MAGIC) {
        "image/jpeg"
    } else if bytes.starts_with(b"RIFF") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Maps a non-image response to an error.
fn classify_failure(status: u16, body: &str) -> GenerationError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .map(|e| e.as_str().map(String::from).unwrap_or_else(|| e.to_string()))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    let lower = message.to_lowercase();

    if matches!(status, 429 | 503 | 504) || lower.contains("loading") || lower.contains("busy") {
        GenerationError::transient(Some(status), message)
    } else {
        GenerationError::fatal(Some(status), message)
    }
}

pub struct HuggingFaceBackend {
    client: Client,
    config: GenerationConfig,
}

impl HuggingFaceBackend {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn model_url(&self, model_id: &str) -> String {
        format!("{}/models/{}", self.config.api_base.trim_end_matches('/'), model_id)
    }
}

#[async_trait]
impl GenerationBackend for HuggingFaceBackend {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn invoke(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        let mut request = self.client.post(self.model_url(model_id)).json(&json!({
            "inputs": prompt,
            "options": { "wait_for_model": true },
        }));
        if !self.config.api_token.is_empty() {
            request = request.bearer_auth(&self.config.api_token);
        }

        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        debug!(model_id, status, %content_type, len = bytes.len(), "Inference response");

        if status == 200 {
            if content_type.starts_with("image/") {
                return Ok(GeneratedImage {
                    bytes,
                    content_type,
                });
            }
            if is_image_bytes(&bytes) {
                let content_type = sniff_content_type(&bytes).to_string();
                return Ok(GeneratedImage {
                    bytes,
                    content_type,
                });
            }
            return Err(GenerationError::fatal(
                Some(status),
                format!("unexpected {} response", content_type),
            ));
        }

        Err(classify_failure(status, &String::from_utf8_lossy(&bytes)))
    }
}
