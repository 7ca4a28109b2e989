//! Mock converter for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::converter::{Converter, ConverterError, TranscodeJob, TranscodeResult};

/// A recorded transcode job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTranscode {
    /// The job that was submitted.
    pub job: TranscodeJob,
    /// Whether the transcode succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track transcode jobs for assertions
/// - Simulate success/failure or a missing ffmpeg binary
/// - Control the size of the written output
///
/// # Example
///
/// ```rust,ignore
/// use courier_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.set_output_size(1200);
///
/// let result = converter.transcode(job).await?;
/// assert_eq!(converter.recorded_jobs().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockConverter {
    /// Recorded transcodes.
    transcodes: Arc<RwLock<Vec<RecordedTranscode>>>,
    /// If set, the next transcode fails with this error.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    /// Behave as if the ffmpeg binary is missing.
    unavailable: Arc<RwLock<bool>>,
    /// Size of the output file. `None` copies the input size.
    output_size: Arc<RwLock<Option<usize>>>,
    /// Report success without writing the output file.
    skip_output: Arc<RwLock<bool>>,
    /// Simulated transcode duration.
    delay: Arc<RwLock<Duration>>,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self {
            transcodes: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            unavailable: Arc::new(RwLock::new(false)),
            output_size: Arc::new(RwLock::new(None)),
            skip_output: Arc::new(RwLock::new(false)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Get all recorded transcodes.
    pub fn recorded(&self) -> Vec<RecordedTranscode> {
        self.transcodes.read().unwrap().clone()
    }

    /// Jobs submitted, successful or not.
    pub fn recorded_jobs(&self) -> Vec<TranscodeJob> {
        self.recorded().into_iter().map(|r| r.job).collect()
    }

    /// Configure the next transcode to fail with the given error.
    pub fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().unwrap() = Some(error);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().unwrap() = unavailable;
    }

    pub fn set_output_size(&self, bytes: usize) {
        *self.output_size.write().unwrap() = Some(bytes);
    }

    pub fn set_skip_output(&self, skip: bool) {
        *self.skip_output.write().unwrap() = skip;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap() = delay;
    }

    fn missing_binary() -> ConverterError {
        ConverterError::FfmpegNotFound {
            path: PathBuf::from("ffmpeg"),
        }
    }

    fn record(&self, job: TranscodeJob, success: bool) {
        self.transcodes
            .write()
            .unwrap()
            .push(RecordedTranscode { job, success });
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, ConverterError> {
        if *self.unavailable.read().unwrap() {
            self.record(job, false);
            return Err(Self::missing_binary());
        }
        let next_error = self.next_error.write().unwrap().take();
        if let Some(err) = next_error {
            self.record(job, false);
            return Err(err);
        }
        if !job.input_path.is_file() {
            let path = job.input_path.clone();
            self.record(job, false);
            return Err(ConverterError::InputNotFound { path });
        }

        let delay = *self.delay.read().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let size = match *self.output_size.read().unwrap() {
            Some(size) => size as u64,
            None => std::fs::metadata(&job.input_path)?.len(),
        };
        if !*self.skip_output.read().unwrap() {
            std::fs::write(&job.output_path, vec![1u8; size as usize])?;
        }

        self.record(job.clone(), true);
        Ok(TranscodeResult {
            job_id: job.job_id,
            output_path: job.output_path,
            output_size_bytes: size,
            duration_ms: delay.as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        if *self.unavailable.read().unwrap() {
            return Err(Self::missing_binary());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::TranscodeProfile;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_basic_transcode() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.webm");
        std::fs::write(&input, vec![0u8; 10]).unwrap();
        let converter = MockConverter::new();

        let job = TranscodeJob::new("job-1", &input, dir.path().join("in.mp4"), TranscodeProfile::Mp4);
        let result = converter.transcode(job).await.unwrap();

        assert_eq!(result.output_size_bytes, 10);
        assert!(result.output_path.is_file());
        assert!(converter.recorded()[0].success);
    }

    #[tokio::test]
    async fn test_error_injection() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.webm");
        std::fs::write(&input, b"x").unwrap();
        let converter = MockConverter::new();
        converter.set_next_error(ConverterError::conversion_failed("test error", None));

        let job = TranscodeJob::new("fail", &input, dir.path().join("out.mp4"), TranscodeProfile::Mp4);
        assert!(converter.transcode(job.clone()).await.is_err());
        // Error should be consumed
        assert!(converter.transcode(job).await.is_ok());

        let recorded = converter.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(!recorded[0].success);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let converter = MockConverter::new();
        converter.set_unavailable(true);
        let err = converter.validate().await.unwrap_err();
        assert_eq!(err.missing_tool(), Some("ffmpeg"));
    }
}
