//! Trait definitions for the delivery module.

use async_trait::async_trait;

use super::error::DeliveryError;
use super::types::{Button, DeliveryTarget, MessageHandle, Payload};

/// A messaging platform the pipeline reports to.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Returns the name of this gateway implementation.
    fn name(&self) -> &str;

    /// Posts a plain text status message.
    async fn send_status(
        &self,
        target: &DeliveryTarget,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError>;

    /// Replaces the text of a status message.
    async fn edit_status(&self, handle: &MessageHandle, text: &str) -> Result<(), DeliveryError>;

    /// Removes a status message.
    async fn delete_status(&self, handle: &MessageHandle) -> Result<(), DeliveryError>;

    /// Delivers the final result with an HTML caption and link buttons.
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        payload: Payload,
        caption: &str,
        buttons: &[Button],
    ) -> Result<MessageHandle, DeliveryError>;
}
