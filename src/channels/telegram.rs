//! Telegram notifier: delivers the digest through the Bot API `sendMessage`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::channels::{SEND_TIMEOUT, http_client};
use crate::error::NotifyError;
use crate::pipeline::types::Notifier;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends text to a single Telegram chat.
pub struct TelegramNotifier {
    bot_token: SecretString,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        Ok(Self {
            bot_token,
            chat_id: chat_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: http_client("telegram", SEND_TIMEOUT)?,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, NotifyError> {
        self.client = http_client("telegram", timeout)?;
        Ok(self)
    }

    /// Point at a different Bot API host (self-hosted server, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Send one message, Markdown first with plain-text fallback.
    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let markdown_body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let status = plain_resp.status().as_u16();
            let body = plain_resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                name: "telegram".into(),
                status,
                body: format!("markdown: {markdown_status}, plain: {body}"),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    /// One `sendMessage` per digest; text past the API limit is cut with an
    /// ellipsis.
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let text = truncate_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        debug!(bytes = text.len(), "Sending Telegram message");
        self.send_text(&text).await
    }
}

const ELLIPSIS: &str = "…";

/// Cut text to at most `max_len` bytes on a UTF-8 boundary, marking the cut
/// with an ellipsis.
fn truncate_message(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let Some(mut end) = max_len.checked_sub(ELLIPSIS.len()) else {
        return String::new();
    };
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{ELLIPSIS}", text[..end].trim_end())
}
