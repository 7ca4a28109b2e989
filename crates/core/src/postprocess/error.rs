//! Error types for the postprocess module.

use thiserror::Error;

/// Failures that prevent both delivery paths.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// The artifact vanished before it could be measured.
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
