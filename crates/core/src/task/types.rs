//! Request and outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::TaskError;
use crate::delivery::{DeliveryTarget, MediaKind, MessageHandle};
use crate::retry::AttemptRecord;
use crate::workspace::CleanupReport;

/// What the requester wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Audio track, delivered as mp3.
    Audio,
    /// Video, delivered as mp4.
    Video,
    /// Restricted video: low resolution, direct locators only, private chats only.
    Adult,
    /// Image generated from a text prompt.
    Image,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Adult => "adult",
            Self::Image => "image",
        }
    }

    /// How the delivered file is presented.
    pub fn media_kind(&self) -> MediaKind {
        match self {
            Self::Audio => MediaKind::Audio,
            Self::Video | Self::Adult => MediaKind::Video,
            Self::Image => MediaKind::Document,
        }
    }

    pub(crate) fn icon(&self) -> &'static str {
        match self {
            Self::Audio => "🎵",
            Self::Video => "🎬",
            Self::Adult => "🔞",
            Self::Image => "🎨",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: i64,
    pub display_name: String,
}

/// One media request. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub kind: RequestKind,
    /// Search phrase, locator, or image prompt.
    pub query: String,
    pub requester: Requester,
    pub target: DeliveryTarget,
    /// Whether the request came from a one-to-one chat.
    #[serde(default)]
    pub private_chat: bool,
    pub received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(
        kind: RequestKind,
        query: impl Into<String>,
        requester: Requester,
        target: DeliveryTarget,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            query: query.into().trim().to_string(),
            requester,
            target,
            private_chat: false,
            received_at: Utc::now(),
        }
    }

    pub fn in_private_chat(mut self) -> Self {
        self.private_chat = true;
        self
    }

    /// Whether the query is a direct locator rather than free text.
    pub fn is_locator(&self) -> bool {
        self.query.starts_with("http://") || self.query.starts_with("https://")
    }

    /// Rejects requests that cannot be processed at all.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.query.is_empty() {
            return Err(TaskError::InvalidRequest("empty query".to_string()));
        }
        if self.kind == RequestKind::Adult {
            if !self.private_chat {
                return Err(TaskError::InvalidRequest(
                    "this command only works in a private chat".to_string(),
                ));
            }
            if !self.is_locator() {
                return Err(TaskError::InvalidRequest(
                    "a direct link is required".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Lifecycle phases, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Received,
    Resolving,
    Acquiring,
    PostProcessing,
    Delivering,
    Cleanup,
    Terminal,
}

impl TaskPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Resolving => "resolving",
            Self::Acquiring => "acquiring",
            Self::PostProcessing => "post_processing",
            Self::Delivering => "delivering",
            Self::Cleanup => "cleanup",
            Self::Terminal => "terminal",
        }
    }
}

/// Error category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    ResolveFailure,
    NoMatchingStream,
    TransientBackendFailure,
    NormalizationFailure,
    OutputMissing,
    DeliveryFailure,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::ResolveFailure => "resolve_failure",
            Self::NoMatchingStream => "no_matching_stream",
            Self::TransientBackendFailure => "transient_backend_failure",
            Self::NormalizationFailure => "normalization_failure",
            Self::OutputMissing => "output_missing",
            Self::DeliveryFailure => "delivery_failure",
            Self::Internal => "internal",
        }
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The artifact was handed to the gateway.
    Delivered {
        message: MessageHandle,
        /// The artifact had to be re-encoded to fit the ceiling.
        compressed: bool,
    },
    /// Too large even after re-encoding; a link was sent instead.
    DeliveredAsLink { url: String, message: MessageHandle },
    Failed {
        kind: FailureKind,
        message: String,
        /// Bounded tail of the underlying diagnostics.
        diagnostic: String,
    },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::DeliveredAsLink { .. } => "delivered_as_link",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Everything known about a finished request.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub request_id: String,
    pub kind: RequestKind,
    pub outcome: Outcome,
    /// Phases entered, in order.
    pub phases: Vec<TaskPhase>,
    /// Every fallback attempt made on behalf of the request.
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip)]
    pub cleanup: Option<CleanupReport>,
    pub duration_ms: u64,
}

impl TaskReport {
    /// Specs abandoned on the way to the outcome, as `chain:spec`.
    pub fn abandoned_specs(&self) -> Vec<String> {
        let attempts = &self.attempts;
        attempts
            .iter()
            .enumerate()
            .filter(|(i, record)| {
                let last_of_spec = attempts.get(i + 1).map_or(true, |next| {
                    next.chain != record.chain || next.spec_index != record.spec_index
                });
                last_of_spec && record.failed()
            })
            .map(|(_, record)| format!("{}:{}", record.chain, record.spec))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::AttemptStatus;

    fn requester() -> Requester {
        Requester {
            id: 1,
            display_name: "alice".to_string(),
        }
    }

    #[test]
    fn test_request_is_locator() {
        let r = Request::new(RequestKind::Audio, "  sanam re ", requester(), DeliveryTarget::new(1));
        assert_eq!(r.query, "sanam re");
        assert!(!r.is_locator());
        let r = Request::new(RequestKind::Video, "https://youtu.be/x", requester(), DeliveryTarget::new(1));
        assert!(r.is_locator());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::new(RequestKind::Audio, "a", requester(), DeliveryTarget::new(1));
        let b = Request::new(RequestKind::Audio, "a", requester(), DeliveryTarget::new(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_adult_requests_need_private_chat_and_locator() {
        let r = Request::new(RequestKind::Adult, "https://example.com/v", requester(), DeliveryTarget::new(1));
        assert!(matches!(r.validate(), Err(TaskError::InvalidRequest(_))));
        assert!(r.clone().in_private_chat().validate().is_ok());

        let r = Request::new(RequestKind::Adult, "some words", requester(), DeliveryTarget::new(1))
            .in_private_chat();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_empty_query_rejected() {
        let r = Request::new(RequestKind::Image, "   ", requester(), DeliveryTarget::new(1));
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_phases_are_ordered() {
        assert!(TaskPhase::Received < TaskPhase::Resolving);
        assert!(TaskPhase::Delivering < TaskPhase::Cleanup);
        assert!(TaskPhase::Cleanup < TaskPhase::Terminal);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = Outcome::Failed {
            kind: FailureKind::NormalizationFailure,
            message: "ffmpeg missing".to_string(),
            diagnostic: String::new(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "normalization_failure");
    }

    #[test]
    fn test_abandoned_specs() {
        let record = |chain: &str, idx: usize, spec: &str, status: AttemptStatus| AttemptRecord {
            chain: chain.to_string(),
            spec: spec.to_string(),
            spec_index: idx,
            attempt: 1,
            status,
            elapsed_ms: 0,
        };
        let report = TaskReport {
            request_id: "r".to_string(),
            kind: RequestKind::Image,
            outcome: Outcome::Delivered {
                message: MessageHandle {
                    chat_id: 1,
                    message_id: 1,
                },
                compressed: false,
            },
            phases: vec![],
            attempts: vec![
                record("generate", 0, "a", AttemptStatus::Transient("429".into())),
                record("generate", 0, "a", AttemptStatus::Transient("429".into())),
                record("generate", 1, "b", AttemptStatus::Fatal("400".into())),
                record("generate", 2, "c", AttemptStatus::Succeeded),
            ],
            cleanup: None,
            duration_ms: 0,
        };
        assert_eq!(report.abandoned_specs(), vec!["generate:a", "generate:b"]);
    }
}
