//! Types for the delivery module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a request's results go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    pub chat_id: i64,
    /// Message to reply to, usually the command that started the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
}

impl DeliveryTarget {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// A message the gateway sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub message_id: i64,
}

/// How a file is presented in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
    Document,
}

/// What gets delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A file on disk.
    File {
        path: PathBuf,
        kind: MediaKind,
        title: Option<String>,
        performer: Option<String>,
        duration_secs: Option<u64>,
    },
    /// An in-memory image.
    Image { bytes: Vec<u8>, file_name: String },
    /// A reference URL instead of binary content.
    Link { url: String },
}

impl Payload {
    pub fn file(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self::File {
            path: path.into(),
            kind,
            title: None,
            performer: None,
            duration_secs: None,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link { .. })
    }
}

/// An inline URL button under a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub url: String,
}

impl Button {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}
