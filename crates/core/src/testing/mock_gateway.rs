//! Mock delivery gateway and progress sink for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::delivery::{Button, DeliveryError, DeliveryGateway, DeliveryTarget, MessageHandle, Payload};
use crate::progress::{ProgressEvent, ProgressSink};

/// A recorded delivery for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub target: DeliveryTarget,
    pub payload: Payload,
    pub caption: String,
    pub buttons: Vec<Button>,
    /// Size of the file at the moment it was handed over.
    pub file_bytes: Option<u64>,
    /// Names of all files next to the delivered file at that moment.
    pub dir_files: Vec<String>,
}

/// Mock implementation of the DeliveryGateway trait.
///
/// Records every status message operation and delivery. Errors can be
/// injected for the next delivery and for all status edits.
///
/// # Example
///
/// ```rust,ignore
/// use courier_core::testing::MockGateway;
///
/// let gateway = MockGateway::new();
/// gateway.set_next_deliver_error(DeliveryError::rejected(413, "Request Entity Too Large"));
///
/// // ... run a request ...
///
/// assert!(gateway.recorded_deliveries().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MockGateway {
    next_message_id: Arc<AtomicI64>,
    statuses: Arc<RwLock<Vec<(MessageHandle, String)>>>,
    edits: Arc<RwLock<Vec<(MessageHandle, String)>>>,
    deletes: Arc<RwLock<Vec<MessageHandle>>>,
    deliveries: Arc<RwLock<Vec<RecordedDelivery>>>,
    /// If set, the next delivery fails with this error.
    next_deliver_error: Arc<RwLock<Option<DeliveryError>>>,
    /// Every status edit fails as if the message was deleted.
    edits_target_gone: Arc<RwLock<bool>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a new mock gateway.
    pub fn new() -> Self {
        Self {
            next_message_id: Arc::new(AtomicI64::new(100)),
            statuses: Arc::new(RwLock::new(Vec::new())),
            edits: Arc::new(RwLock::new(Vec::new())),
            deletes: Arc::new(RwLock::new(Vec::new())),
            deliveries: Arc::new(RwLock::new(Vec::new())),
            next_deliver_error: Arc::new(RwLock::new(None)),
            edits_target_gone: Arc::new(RwLock::new(false)),
        }
    }

    /// Status messages posted, with their text.
    pub fn recorded_statuses(&self) -> Vec<(MessageHandle, String)> {
        self.statuses.read().unwrap().clone()
    }

    /// Successful status edits, in order.
    pub fn recorded_edits(&self) -> Vec<(MessageHandle, String)> {
        self.edits.read().unwrap().clone()
    }

    pub fn recorded_deletes(&self) -> Vec<MessageHandle> {
        self.deletes.read().unwrap().clone()
    }

    pub fn recorded_deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.read().unwrap().clone()
    }

    /// Configure the next delivery to fail with the given error.
    pub fn set_next_deliver_error(&self, error: DeliveryError) {
        *self.next_deliver_error.write().unwrap() = Some(error);
    }

    pub fn set_edits_target_gone(&self, gone: bool) {
        *self.edits_target_gone.write().unwrap() = gone;
    }

    fn next_handle(&self, chat_id: i64) -> MessageHandle {
        MessageHandle {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl DeliveryGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_status(
        &self,
        target: &DeliveryTarget,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        let handle = self.next_handle(target.chat_id);
        self.statuses
            .write()
            .unwrap()
            .push((handle.clone(), text.to_string()));
        Ok(handle)
    }

    async fn edit_status(&self, handle: &MessageHandle, text: &str) -> Result<(), DeliveryError> {
        if *self.edits_target_gone.read().unwrap() {
            return Err(DeliveryError::target_gone("message to edit not found"));
        }
        self.edits
            .write()
            .unwrap()
            .push((handle.clone(), text.to_string()));
        Ok(())
    }

    async fn delete_status(&self, handle: &MessageHandle) -> Result<(), DeliveryError> {
        self.deletes.write().unwrap().push(handle.clone());
        Ok(())
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        payload: Payload,
        caption: &str,
        buttons: &[Button],
    ) -> Result<MessageHandle, DeliveryError> {
        let next_error = self.next_deliver_error.write().unwrap().take();
        if let Some(err) = next_error {
            return Err(err);
        }

        let (file_bytes, dir_files) = match &payload {
            Payload::File { path, .. } => {
                let mut names = Vec::new();
                if let Some(dir) = path.parent() {
                    for entry in std::fs::read_dir(dir)? {
                        names.push(entry?.file_name().to_string_lossy().into_owned());
                    }
                }
                names.sort();
                (Some(std::fs::metadata(path)?.len()), names)
            }
            Payload::Image { bytes, .. } => (Some(bytes.len() as u64), Vec::new()),
            Payload::Link { .. } => (None, Vec::new()),
        };
        self.deliveries.write().unwrap().push(RecordedDelivery {
            target: target.clone(),
            payload,
            caption: caption.to_string(),
            buttons: buttons.to_vec(),
            file_bytes,
            dir_files,
        });
        Ok(self.next_handle(target.chat_id))
    }
}

/// A progress sink that records what it was shown.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    shown: Arc<RwLock<Vec<ProgressEvent>>>,
    attempts: Arc<RwLock<usize>>,
    /// If set, the next show fails with this error.
    next_error: Arc<RwLock<Option<DeliveryError>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events shown successfully, in order.
    pub fn shown(&self) -> Vec<ProgressEvent> {
        self.shown.read().unwrap().clone()
    }

    /// Number of show calls, failed ones included.
    pub fn attempts(&self) -> usize {
        *self.attempts.read().unwrap()
    }

    pub fn set_next_error(&self, error: DeliveryError) {
        *self.next_error.write().unwrap() = Some(error);
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn show(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
        *self.attempts.write().unwrap() += 1;
        let next_error = self.next_error.write().unwrap().take();
        if let Some(err) = next_error {
            return Err(err);
        }
        self.shown.write().unwrap().push(*event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_message_ids_increase() {
        let gateway = MockGateway::new();
        let target = DeliveryTarget::new(5);
        let a = gateway.send_status(&target, "one").await.unwrap();
        let b = gateway.send_status(&target, "two").await.unwrap();
        assert!(b.message_id > a.message_id);
        assert_eq!(gateway.recorded_statuses().len(), 2);
    }

    #[tokio::test]
    async fn test_deliver_error_injection() {
        let gateway = MockGateway::new();
        gateway.set_next_deliver_error(DeliveryError::rejected(400, "Bad Request"));
        let target = DeliveryTarget::new(5);
        let link = Payload::Link {
            url: "https://x".to_string(),
        };

        assert!(gateway.deliver(&target, link.clone(), "c", &[]).await.is_err());
        assert!(gateway.deliver(&target, link, "c", &[]).await.is_ok());
        assert_eq!(gateway.recorded_deliveries().len(), 1);
    }
}
