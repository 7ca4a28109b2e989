//! Request failure taxonomy.

use thiserror::Error;

use super::types::FailureKind;
use crate::acquisition::AcquisitionError;
use crate::delivery::DeliveryError;
use crate::postprocess::PostProcessError;
use crate::retry::{truncate_tail, ChainFailure};

/// Why a request ended without delivery.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The request itself cannot be processed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The query or locator did not resolve to an asset.
    #[error("could not resolve query")]
    ResolveFailure(ChainFailure),

    /// Every attempt spec failed.
    #[error("no {} spec could be satisfied", .0.chain)]
    NoMatchingStream(ChainFailure),

    /// Every attempt spec failed, and only transiently.
    #[error("{} backends are temporarily unavailable", .0.chain)]
    TransientBackendFailure(ChainFailure),

    /// A required tool is missing or the encode failed.
    #[error("normalization failed: {reason}")]
    NormalizationFailure {
        reason: String,
        /// Name of the missing external tool, if that is the cause.
        missing_tool: Option<String>,
        diagnostic: String,
    },

    /// A step succeeded but its output file is absent.
    #[error("output file not found: {0}")]
    OutputMissing(String),

    /// The gateway did not accept the payload.
    #[error("delivery failed: {0}")]
    DeliveryFailure(#[from] DeliveryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TaskError {
    /// Classifies an exhausted chain.
    pub fn from_exhausted(failure: ChainFailure) -> Self {
        if failure.all_transient() {
            Self::TransientBackendFailure(failure)
        } else {
            Self::NoMatchingStream(failure)
        }
    }

    pub fn missing_tool(tool: &str) -> Self {
        Self::NormalizationFailure {
            reason: format!("{} is not installed or not executable", tool),
            missing_tool: Some(tool.to_string()),
            diagnostic: String::new(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::ResolveFailure(_) => FailureKind::ResolveFailure,
            Self::NoMatchingStream(_) => FailureKind::NoMatchingStream,
            Self::TransientBackendFailure(_) => FailureKind::TransientBackendFailure,
            Self::NormalizationFailure { .. } => FailureKind::NormalizationFailure,
            Self::OutputMissing(_) => FailureKind::OutputMissing,
            Self::DeliveryFailure(_) => FailureKind::DeliveryFailure,
            Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Raw diagnostic text behind the failure, if any.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::ResolveFailure(f) | Self::NoMatchingStream(f) | Self::TransientBackendFailure(f) => {
                f.diagnostic.clone()
            }
            Self::NormalizationFailure { diagnostic, .. } => diagnostic.clone(),
            Self::DeliveryFailure(e) => e.to_string(),
            _ => String::new(),
        }
    }

    /// Plain-text message for the requester.
    ///
    /// The diagnostic tail is cut from the front so the whole message stays
    /// within `max_chars`.
    pub fn user_message(&self, max_chars: usize) -> String {
        let headline = match self {
            Self::InvalidRequest(reason) => format!("Cannot process this request: {}.", reason),
            Self::ResolveFailure(_) => "Nothing matched your query.".to_string(),
            Self::NoMatchingStream(_) => "No downloadable stream matched.".to_string(),
            Self::TransientBackendFailure(_) => {
                "The service is busy right now. Please try again later.".to_string()
            }
            Self::NormalizationFailure {
                missing_tool: Some(tool),
                ..
            } => format!(
                "Conversion failed: {} is missing on the server. Please contact the admin.",
                tool
            ),
            Self::NormalizationFailure { .. } => "Conversion failed.".to_string(),
            Self::OutputMissing(_) => "The downloaded file could not be found.".to_string(),
            Self::DeliveryFailure(_) => "Could not send the file.".to_string(),
            Self::Internal(_) => "Something went wrong.".to_string(),
        };

        let diagnostic = self.diagnostic();
        if diagnostic.is_empty() {
            return truncate_tail(&headline, max_chars);
        }
        let budget = max_chars.saturating_sub(headline.chars().count() + 2);
        if budget == 0 {
            return truncate_tail(&headline, max_chars);
        }
        format!("{}\n\n{}", headline, truncate_tail(&diagnostic, budget))
    }
}

impl From<AcquisitionError> for TaskError {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::ResolveFailed(failure) if failure.all_transient() => {
                Self::TransientBackendFailure(failure)
            }
            AcquisitionError::ResolveFailed(failure) => Self::ResolveFailure(failure),
            AcquisitionError::NoMatchingStream(failure) => Self::from_exhausted(failure),
            AcquisitionError::NormalizationToolUnavailable { tool } => Self::missing_tool(&tool),
            AcquisitionError::NormalizationFailed { reason, diagnostic } => {
                Self::NormalizationFailure {
                    reason,
                    missing_tool: None,
                    diagnostic,
                }
            }
            AcquisitionError::OutputMissing { expected } => Self::OutputMissing(expected),
            AcquisitionError::Workspace(e) => Self::Internal(format!("workspace: {}", e)),
        }
    }
}

impl From<PostProcessError> for TaskError {
    fn from(err: PostProcessError) -> Self {
        match err {
            PostProcessError::ArtifactMissing(path) => Self::OutputMissing(path),
            PostProcessError::Io(e) => Self::Internal(format!("post-processing: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{AttemptRecord, AttemptStatus};

    fn failure(statuses: Vec<AttemptStatus>) -> ChainFailure {
        ChainFailure {
            chain: "fetch".to_string(),
            records: statuses
                .into_iter()
                .enumerate()
                .map(|(i, status)| AttemptRecord {
                    chain: "fetch".to_string(),
                    spec: format!("spec{}", i),
                    spec_index: i,
                    attempt: 1,
                    status,
                    elapsed_ms: 0,
                })
                .collect(),
            diagnostic: "x".repeat(10_000),
        }
    }

    #[test]
    fn test_exhausted_chain_classification() {
        let all_transient = failure(vec![
            AttemptStatus::Transient("429".into()),
            AttemptStatus::Transient("503".into()),
        ]);
        assert_eq!(
            TaskError::from_exhausted(all_transient).kind(),
            FailureKind::TransientBackendFailure
        );

        let mixed = failure(vec![
            AttemptStatus::Transient("429".into()),
            AttemptStatus::Fatal("format unavailable".into()),
        ]);
        assert_eq!(
            TaskError::from_exhausted(mixed).kind(),
            FailureKind::NoMatchingStream
        );
    }

    #[test]
    fn test_user_message_is_bounded() {
        let err = TaskError::from_exhausted(failure(vec![AttemptStatus::Fatal("bad".into())]));
        let message = err.user_message(4000);
        assert!(message.chars().count() <= 4000);
        assert!(message.starts_with("No downloadable stream matched."));
    }

    #[test]
    fn test_user_message_names_missing_tool() {
        let err = TaskError::missing_tool("ffmpeg");
        assert_eq!(err.kind(), FailureKind::NormalizationFailure);
        assert!(err.user_message(4000).contains("ffmpeg"));
    }

    #[test]
    fn test_acquisition_errors_map_to_kinds() {
        let err = TaskError::from(AcquisitionError::NormalizationToolUnavailable {
            tool: "ffmpeg".to_string(),
        });
        assert_eq!(err.kind(), FailureKind::NormalizationFailure);

        let err = TaskError::from(AcquisitionError::ResolveFailed(failure(vec![
            AttemptStatus::Fatal("unsupported url".into()),
        ])));
        assert_eq!(err.kind(), FailureKind::ResolveFailure);

        let err = TaskError::from(AcquisitionError::OutputMissing {
            expected: "/tmp/x.mp3".to_string(),
        });
        assert_eq!(err.kind(), FailureKind::OutputMissing);
    }

    #[test]
    fn test_user_message_tiny_budget() {
        let err = TaskError::Internal("boom".to_string());
        assert_eq!(err.user_message(5).chars().count(), 5);
    }
}
