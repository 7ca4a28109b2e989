//! Error types for the generation module.

use thiserror::Error;

use crate::retry::AttemptError;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Rate limited, model loading or busy.
    #[error("{}{message}", status_prefix(.status))]
    Transient { status: Option<u16>, message: String },

    /// The model rejected the request for good.
    #[error("{}{message}", status_prefix(.status))]
    Fatal { status: Option<u16>, message: String },

    /// The attempt ran out of time.
    #[error("Timed out")]
    Timeout,

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),
}

fn status_prefix(status: &Option<u16>) -> String {
    status.map(|s| format!("HTTP {}: ", s)).unwrap_or_default()
}

impl GenerationError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    pub fn fatal(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fatal {
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout)
    }

    pub fn to_attempt_error(&self) -> AttemptError {
        if self.is_transient() {
            AttemptError::transient(self.to_string())
        } else {
            AttemptError::fatal(self.to_string())
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}
