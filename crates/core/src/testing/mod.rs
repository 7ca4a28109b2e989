//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! allowing the whole request pipeline to run in tests without yt-dlp,
//! ffmpeg or a messaging platform.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_core::testing::{MockConverter, MockGateway, MockResolver};
//!
//! let resolver = MockResolver::new();
//! let converter = MockConverter::new();
//! let gateway = MockGateway::new();
//!
//! // Configure mock behavior
//! resolver.set_fetch_size(2500);
//! converter.set_output_size(1200);
//!
//! // Hand them to a TaskOrchestrator...
//! ```

mod mock_converter;
mod mock_gateway;
mod mock_generation;
mod mock_resolver;

pub use mock_converter::{MockConverter, RecordedTranscode};
pub use mock_gateway::{MockGateway, RecordedDelivery, RecordingSink};
pub use mock_generation::MockGenerationBackend;
pub use mock_resolver::MockResolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::delivery::DeliveryTarget;
    use crate::resolver::AssetMetadata;
    use crate::task::{Request, RequestKind, Requester};

    /// A three-minute music video with full metadata.
    pub fn asset() -> AssetMetadata {
        AssetMetadata {
            source: "sanam re".to_string(),
            id: Some("abc123".to_string()),
            title: Some("Sanam Re".to_string()),
            uploader: Some("T-Series".to_string()),
            channel_url: Some("https://www.youtube.com/@tseries".to_string()),
            webpage_url: Some("https://www.youtube.com/watch?v=abc123".to_string()),
            direct_url: None,
            extension: Some("webm".to_string()),
            duration_secs: Some(180.0),
            view_count: Some(1_234_567),
            like_count: Some(45_000),
            dislike_count: None,
            comment_count: Some(3_210),
            categories: vec!["Music".to_string()],
            timestamp: Some(1_452_816_000),
            upload_date: Some("20160115".to_string()),
            filesize_approx: None,
        }
    }

    pub fn requester() -> Requester {
        Requester {
            id: 1001,
            display_name: "Alice".to_string(),
        }
    }

    /// A request from a group chat.
    pub fn request(kind: RequestKind, query: &str) -> Request {
        Request::new(kind, query, requester(), DeliveryTarget::new(-100_200))
    }
}
