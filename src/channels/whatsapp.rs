//! WhatsApp notifier: Cloud API text messages.
//!
//! `POST {base}/{version}/{phone_number_id}/messages` with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::channels::{SEND_TIMEOUT, http_client};
use crate::error::NotifyError;
use crate::pipeline::types::Notifier;

const DEFAULT_API_BASE: &str = "https://graph.facebook.com";
const API_VERSION: &str = "v18.0";

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

/// Sends text to one WhatsApp recipient through a business phone number.
pub struct WhatsAppNotifier {
    token: SecretString,
    phone_number_id: String,
    recipient: String,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppNotifier {
    pub fn new(
        token: SecretString,
        phone_number_id: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            token,
            phone_number_id: phone_number_id.into(),
            recipient: recipient.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: http_client("whatsapp", SEND_TIMEOUT)?,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, NotifyError> {
        self.client = http_client("whatsapp", timeout)?;
        Ok(self)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{API_VERSION}/{}/messages",
            self.api_base, self.phone_number_id
        )
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let request = SendRequest {
            messaging_product: "whatsapp",
            to: &self.recipient,
            kind: "text",
            text: TextBody { body: text },
        };

        let resp = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                name: "whatsapp".into(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %self.recipient, "WhatsApp message accepted");
        Ok(())
    }
}
