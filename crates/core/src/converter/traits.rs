//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::error::ConverterError;
use super::types::{TranscodeJob, TranscodeResult};

/// A converter that can transcode media files.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Transcodes `job.input_path` into `job.output_path` using `job.profile`.
    ///
    /// The input is left in place; callers decide when to remove it.
    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, ConverterError>;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;
}
