//! Error types for the resolver module.

use std::path::PathBuf;
use thiserror::Error;

use crate::retry::AttemptError;

/// Errors from resolving or fetching an asset.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The resolver binary is not installed.
    #[error("yt-dlp not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// The operation exceeded its deadline and was killed.
    #[error("Timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The remote side throttled us.
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Connection-level failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Nothing matches the locator or query.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The asset exists but not in the requested format.
    #[error("Format '{format}' not available: {message}")]
    FormatUnavailable { format: String, message: String },

    /// Any other resolver failure.
    #[error("Resolver failed: {message}")]
    Failed { message: String },

    /// Resolver output could not be understood.
    #[error("Failed to parse resolver output: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Network { .. } | Self::Io(_)
        )
    }

    /// Classification for the fallback engine.
    pub fn to_attempt_error(&self) -> AttemptError {
        if self.is_transient() {
            AttemptError::transient(self.to_string())
        } else {
            AttemptError::fatal(self.to_string())
        }
    }

    /// Classifies resolver stderr output.
    pub fn from_stderr(format: Option<&str>, stderr: &str) -> Self {
        let message = stderr
            .lines()
            .rev()
            .find(|l| l.starts_with("ERROR"))
            .unwrap_or_else(|| stderr.trim())
            .to_string();
        let lower = stderr.to_lowercase();

        if lower.contains("http error 429") || lower.contains("too many requests") {
            Self::RateLimited { message }
        } else if lower.contains("timed out")
            || lower.contains("connection reset")
            || lower.contains("temporary failure in name resolution")
            || lower.contains("unable to download webpage")
            || lower.contains("urlopen error")
            || lower.contains("http error 5")
        {
            Self::Network { message }
        } else if lower.contains("requested format is not available") {
            Self::FormatUnavailable {
                format: format.unwrap_or("default").to_string(),
                message,
            }
        } else if lower.contains("unsupported url")
            || lower.contains("video unavailable")
            || lower.contains("private video")
            || lower.contains("no video formats found")
            || lower.contains("is not a valid url")
            || lower.contains("http error 404")
        {
            Self::NotFound { message }
        } else {
            Self::Failed { message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let err = ResolverError::from_stderr(
            None,
            "WARNING: something\nERROR: unable to download: HTTP Error 429: Too Many Requests",
        );
        assert!(matches!(err, ResolverError::RateLimited { .. }));
        assert!(err.is_transient());
        assert!(err.to_attempt_error().is_transient());
    }

    #[test]
    fn test_classify_format_unavailable() {
        let err = ResolverError::from_stderr(
            Some("bestaudio[ext=m4a]"),
            "ERROR: [youtube] abc: Requested format is not available. Use --list-formats",
        );
        match &err {
            ResolverError::FormatUnavailable { format, message } => {
                assert_eq!(format, "bestaudio[ext=m4a]");
                assert!(message.starts_with("ERROR"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_not_found_and_network() {
        assert!(matches!(
            ResolverError::from_stderr(None, "ERROR: Unsupported URL: https://example.com"),
            ResolverError::NotFound { .. }
        ));
        assert!(matches!(
            ResolverError::from_stderr(None, "ERROR: <urlopen error [Errno -3] Temporary failure in name resolution>"),
            ResolverError::Network { .. }
        ));
        assert!(matches!(
            ResolverError::from_stderr(None, "something odd"),
            ResolverError::Failed { .. }
        ));
    }
}
