//! Error types for the acquisition module.

use thiserror::Error;

use crate::retry::{AttemptRecord, ChainFailure};

/// Distinct ways acquisition can fail.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// No resolve target produced an asset.
    #[error("resolve failed: {}", .0.diagnostic)]
    ResolveFailed(ChainFailure),

    /// No format of the chain could be fetched.
    #[error("no stream matched the format preferences: {}", .0.diagnostic)]
    NoMatchingStream(ChainFailure),

    /// The transcoder binary is missing.
    #[error("{tool} is not available")]
    NormalizationToolUnavailable { tool: String },

    /// The transcoder ran and failed.
    #[error("normalization failed: {reason}")]
    NormalizationFailed { reason: String, diagnostic: String },

    /// Nothing usable was found where output was expected.
    #[error("output not found: {expected}")]
    OutputMissing { expected: String },

    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

impl AcquisitionError {
    /// Attempt log of the failed chain, if a chain failed.
    pub fn records(&self) -> &[AttemptRecord] {
        match self {
            Self::ResolveFailed(f) | Self::NoMatchingStream(f) => &f.records,
            _ => &[],
        }
    }
}
