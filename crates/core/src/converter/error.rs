//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during transcoding.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// The encoder ran but did not produce a usable file.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Name of the missing external tool, if that is what went wrong.
    pub fn missing_tool(&self) -> Option<&'static str> {
        match self {
            Self::FfmpegNotFound { .. } => Some("ffmpeg"),
            _ => None,
        }
    }

    /// Encoder output captured for diagnostics.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ConversionFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        let err = ConverterError::FfmpegNotFound {
            path: PathBuf::from("/usr/bin/ffmpeg"),
        };
        assert_eq!(err.missing_tool(), Some("ffmpeg"));

        let err = ConverterError::Timeout { timeout_secs: 5 };
        assert_eq!(err.missing_tool(), None);
    }

    #[test]
    fn test_stderr_accessor() {
        let err = ConverterError::conversion_failed("exit 1", Some("Invalid data".into()));
        assert_eq!(err.stderr(), Some("Invalid data"));
        assert!(err.to_string().contains("exit 1"));
    }
}
