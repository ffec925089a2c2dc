//! Gmail REST payload types.

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine as _, alphabet};
use serde::Deserialize;

/// Gmail sends URL-safe base64 and is inconsistent about padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A full message resource (`users.messages.get`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: MessagePart,
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Inline body of a MIME part. `data` is absent for attachments and containers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Reference returned by `users.messages.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// `users.messages.list` response. `messages` is omitted when nothing matches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: u64,
}

/// `users.getProfile` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
    #[serde(default)]
    pub messages_total: u64,
}

impl MessagePart {
    /// Value of the first header named `name` (case-insensitive), or "".
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }

    /// Decoded text of the first `text/plain` part with inline data.
    ///
    /// Multipart trees are searched depth-first. Returns `None` when no
    /// plain-text part carries data or the data does not decode.
    pub fn plain_text(&self) -> Option<String> {
        if !self.parts.is_empty() {
            return self.parts.iter().find_map(MessagePart::plain_text);
        }
        if !self.mime_type.eq_ignore_ascii_case("text/plain") {
            return None;
        }
        self.body.data.as_deref().and_then(decode_base64url)
    }
}

/// Decode Gmail's base64url body data. Invalid UTF-8 is replaced lossily.
pub fn decode_base64url(data: &str) -> Option<String> {
    let bytes = URL_SAFE_LENIENT.decode(data.trim()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
