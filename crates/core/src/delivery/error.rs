//! Error types for the delivery module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The chat or message no longer exists, or the bot lost access to it.
    #[error("Delivery target gone: {reason}")]
    TargetGone { reason: String },

    /// An edit would not change the message.
    #[error("Message not modified")]
    NotModified,

    /// The platform asked us to slow down.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The platform refused the payload.
    #[error("Rejected ({status}): {description}")]
    Rejected { status: u16, description: String },

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Response could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    pub fn target_gone(reason: impl Into<String>) -> Self {
        Self::TargetGone {
            reason: reason.into(),
        }
    }

    pub fn rejected(status: u16, description: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            description: description.into(),
        }
    }

    pub fn is_target_gone(&self) -> bool {
        matches!(self, Self::TargetGone { .. })
    }

    /// Classifies a Bot API error description.
    pub fn from_api(status: u16, description: &str, retry_after: Option<u64>) -> Self {
        let lower = description.to_lowercase();
        if status == 429 {
            return Self::RateLimited {
                retry_after_secs: retry_after.unwrap_or(1),
            };
        }
        if lower.contains("message is not modified") {
            return Self::NotModified;
        }
        if lower.contains("message to edit not found")
            || lower.contains("message to delete not found")
            || lower.contains("message_id_invalid")
            || lower.contains("chat not found")
            || lower.contains("bot was blocked")
            || lower.contains("bot was kicked")
        {
            return Self::target_gone(description);
        }
        Self::rejected(status, description)
    }
}

impl From<reqwest::Error> for DeliveryError {
    /// Drops the request URL, which carries the bot token.
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_classification() {
        assert!(matches!(
            DeliveryError::from_api(429, "Too Many Requests: retry after 7", Some(7)),
            DeliveryError::RateLimited { retry_after_secs: 7 }
        ));
        assert!(matches!(
            DeliveryError::from_api(400, "Bad Request: message is not modified", None),
            DeliveryError::NotModified
        ));
        assert!(DeliveryError::from_api(400, "Bad Request: message to edit not found", None)
            .is_target_gone());
        assert!(DeliveryError::from_api(400, "Bad Request: MESSAGE_ID_INVALID", None)
            .is_target_gone());
        assert!(matches!(
            DeliveryError::from_api(413, "Request Entity Too Large", None),
            DeliveryError::Rejected { status: 413, .. }
        ));
    }
}
