//! Handing finished results to the messaging side.
//!
//! The [`DeliveryGateway`] trait covers the two things the pipeline needs
//! from a chat platform: a status message it can edit while work is in
//! progress, and a final delivery of a file, an image or a link.
//! [`TelegramGateway`] implements it over the Telegram Bot API.

pub mod caption;
mod config;
mod error;
mod telegram;
mod traits;
mod types;

pub use config::TelegramConfig;
pub use error::DeliveryError;
pub use telegram::TelegramGateway;
pub use traits::DeliveryGateway;
pub use types::{Button, DeliveryTarget, MediaKind, MessageHandle, Payload};
