//! Destinations for progress events.

use std::sync::Arc;

use async_trait::async_trait;

use super::bridge::ProgressEvent;
use super::render::render_progress;
use crate::delivery::{DeliveryError, DeliveryGateway, MessageHandle};

/// Something that can display progress.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Shows one event. `DeliveryError::TargetGone` tells the pump to stop.
    async fn show(&self, event: &ProgressEvent) -> Result<(), DeliveryError>;
}

/// Edits a chat status message with a rendered progress bar.
pub struct StatusMessageSink {
    gateway: Arc<dyn DeliveryGateway>,
    handle: MessageHandle,
    prefix: String,
    bar_width: usize,
}

impl StatusMessageSink {
    pub fn new(
        gateway: Arc<dyn DeliveryGateway>,
        handle: MessageHandle,
        prefix: impl Into<String>,
        bar_width: usize,
    ) -> Self {
        Self {
            gateway,
            handle,
            prefix: prefix.into(),
            bar_width,
        }
    }
}

#[async_trait]
impl ProgressSink for StatusMessageSink {
    async fn show(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
        let text = render_progress(&self.prefix, event, self.bar_width);
        self.gateway.edit_status(&self.handle, &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryTarget;
    use crate::testing::MockGateway;

    #[tokio::test]
    async fn test_status_sink_edits_message() {
        let gateway = Arc::new(MockGateway::new());
        let handle = gateway
            .send_status(&DeliveryTarget::new(7), "starting")
            .await
            .unwrap();
        let sink = StatusMessageSink::new(gateway.clone(), handle.clone(), "Downloading", 10);

        sink.show(&ProgressEvent::new(1, Some(2))).await.unwrap();

        let edits = gateway.recorded_edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, handle);
        assert!(edits[0].1.starts_with("Downloading: 50.0%"));
    }
}
