//! Telegram Bot API gateway.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::config::TelegramConfig;
use super::error::DeliveryError;
use super::traits::DeliveryGateway;
use super::types::{Button, DeliveryTarget, MediaKind, MessageHandle, Payload};

const PARSE_MODE: &str = "HTML";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Gateway that talks to the Telegram Bot API over HTTPS.
pub struct TelegramGateway {
    client: Client,
    config: TelegramConfig,
}

impl TelegramGateway {
    pub fn new(config: TelegramConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call_json(&self, method: &str, body: Value) -> Result<Value, DeliveryError> {
        let resp = self.client.post(self.api_url(method)).json(&body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        parse_api_response(status, &text)
    }

    async fn call_multipart(&self, method: &str, form: Form) -> Result<Value, DeliveryError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        parse_api_response(status, &text)
    }

    async fn file_part(path: &Path) -> Result<Part, DeliveryError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(Part::stream_with_length(reqwest::Body::from(file), len).file_name(file_name))
    }

    fn base_form(target: &DeliveryTarget, caption: &str, buttons: &[Button]) -> Form {
        let mut form = Form::new()
            .text("chat_id", target.chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", PARSE_MODE);
        if let Some(reply_to) = target.reply_to {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }
        if let Some(markup) = reply_markup(buttons) {
            form = form.text("reply_markup", markup.to_string());
        }
        form
    }
}

/// Inline keyboard with all buttons on one row.
fn reply_markup(buttons: &[Button]) -> Option<Value> {
    if buttons.is_empty() {
        return None;
    }
    let row: Vec<Value> = buttons
        .iter()
        .map(|b| json!({ "text": b.label, "url": b.url }))
        .collect();
    Some(json!({ "inline_keyboard": [row] }))
}

fn parse_api_response(status: u16, body: &str) -> Result<Value, DeliveryError> {
    let parsed: ApiResponse = serde_json::from_str(body).map_err(|e| {
        DeliveryError::InvalidResponse(format!("HTTP {}: {} ({})", status, e, body.trim()))
    })?;

    if parsed.ok {
        return Ok(parsed.result.unwrap_or(Value::Null));
    }

    let description = parsed.description.unwrap_or_else(|| "unknown error".to_string());
    let retry_after = parsed.parameters.and_then(|p| p.retry_after);
    Err(DeliveryError::from_api(
        parsed.error_code.unwrap_or(status),
        &description,
        retry_after,
    ))
}

fn message_handle(result: &Value) -> Result<MessageHandle, DeliveryError> {
    let message_id = result
        .get("message_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DeliveryError::InvalidResponse("missing message_id".to_string()))?;
    let chat_id = result
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .ok_or_else(|| DeliveryError::InvalidResponse("missing chat.id".to_string()))?;
    Ok(MessageHandle {
        chat_id,
        message_id,
    })
}

#[async_trait]
impl DeliveryGateway for TelegramGateway {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_status(
        &self,
        target: &DeliveryTarget,
        text: &str,
    ) -> Result<MessageHandle, DeliveryError> {
        let mut body = json!({ "chat_id": target.chat_id, "text": text });
        if let Some(reply_to) = target.reply_to {
            body["reply_to_message_id"] = json!(reply_to);
        }
        let result = self.call_json("sendMessage", body).await?;
        message_handle(&result)
    }

    async fn edit_status(&self, handle: &MessageHandle, text: &str) -> Result<(), DeliveryError> {
        let body = json!({
            "chat_id": handle.chat_id,
            "message_id": handle.message_id,
            "text": text,
        });
        self.call_json("editMessageText", body).await?;
        Ok(())
    }

    async fn delete_status(&self, handle: &MessageHandle) -> Result<(), DeliveryError> {
        let body = json!({ "chat_id": handle.chat_id, "message_id": handle.message_id });
        self.call_json("deleteMessage", body).await?;
        Ok(())
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        payload: Payload,
        caption: &str,
        buttons: &[Button],
    ) -> Result<MessageHandle, DeliveryError> {
        let result = match payload {
            Payload::Link { url } => {
                let mut buttons = buttons.to_vec();
                buttons.insert(0, Button::new("Download", url));
                let mut body = json!({
                    "chat_id": target.chat_id,
                    "text": caption,
                    "parse_mode": PARSE_MODE,
                });
                if let Some(reply_to) = target.reply_to {
                    body["reply_to_message_id"] = json!(reply_to);
                }
                if let Some(markup) = reply_markup(&buttons) {
                    body["reply_markup"] = markup;
                }
                self.call_json("sendMessage", body).await?
            }
            Payload::Image { bytes, file_name } => {
                let form = Self::base_form(target, caption, buttons)
                    .part("photo", Part::bytes(bytes).file_name(file_name));
                self.call_multipart("sendPhoto", form).await?
            }
            Payload::File {
                path,
                kind,
                title,
                performer,
                duration_secs,
            } => {
                let part = Self::file_part(&path).await?;
                let mut form = Self::base_form(target, caption, buttons);
                if let Some(duration) = duration_secs {
                    form = form.text("duration", duration.to_string());
                }
                let (method, field) = match kind {
                    MediaKind::Audio => {
                        if let Some(title) = title {
                            form = form.text("title", title);
                        }
                        if let Some(performer) = performer {
                            form = form.text("performer", performer);
                        }
                        ("sendAudio", "audio")
                    }
                    MediaKind::Video => {
                        form = form.text("supports_streaming", "true");
                        ("sendVideo", "video")
                    }
                    MediaKind::Document => ("sendDocument", "document"),
                };
                debug!(method, path = %path.display(), "Uploading file");
                self.call_multipart(method, form.part(field, part)).await?
            }
        };

        let handle = message_handle(&result)?;
        info!(
            chat_id = handle.chat_id,
            message_id = handle.message_id,
            "Delivered to Telegram"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let gateway =
            TelegramGateway::new(TelegramConfig::new("123:abc").with_api_base("http://localhost:8081/"))
                .unwrap();
        assert_eq!(
            gateway.api_url("sendAudio"),
            "http://localhost:8081/bot123:abc/sendAudio"
        );
    }

    #[test]
    fn test_reply_markup_single_row() {
        assert!(reply_markup(&[]).is_none());
        let markup = reply_markup(&[
            Button::new("Developer", "https://t.me/dev"),
            Button::new("Contact", "https://t.me/bot"),
        ])
        .unwrap();
        assert_eq!(markup["inline_keyboard"][0][1]["text"], "Contact");
        assert_eq!(markup["inline_keyboard"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_api_response_ok() {
        let body = r#"{"ok":true,"result":{"message_id":42,"chat":{"id":-100}}}"#;
        let result = parse_api_response(200, body).unwrap();
        let handle = message_handle(&result).unwrap();
        assert_eq!(
            handle,
            MessageHandle {
                chat_id: -100,
                message_id: 42
            }
        );
    }

    #[test]
    fn test_parse_api_response_errors() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 5","parameters":{"retry_after":5}}"#;
        assert!(matches!(
            parse_api_response(429, body),
            Err(DeliveryError::RateLimited { retry_after_secs: 5 })
        ));

        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: message to edit not found"}"#;
        assert!(parse_api_response(400, body).unwrap_err().is_target_gone());

        assert!(matches!(
            parse_api_response(502, "<html>Bad Gateway</html>"),
            Err(DeliveryError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_network_failure_does_not_leak_token() {
        let gateway = TelegramGateway::new(
            TelegramConfig::new("123456:SECRET-TOKEN").with_api_base("http://127.0.0.1:1"),
        )
        .unwrap();
        let target = DeliveryTarget {
            chat_id: 7,
            reply_to: None,
        };

        let err = gateway
            .deliver(
                &target,
                Payload::Link {
                    url: "https://example.com/a.mp4".to_string(),
                },
                "caption",
                &[],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Network(_)));
        assert!(!err.to_string().contains("SECRET-TOKEN"));
        let message = crate::task::TaskError::DeliveryFailure(err).user_message(4000);
        assert!(message.starts_with("Could not send the file."));
        assert!(!message.contains("SECRET-TOKEN"));
    }

    #[test]
    fn test_message_handle_requires_ids() {
        assert!(message_handle(&json!({"message_id": 1})).is_err());
        assert!(message_handle(&Value::Null).is_err());
    }
}
