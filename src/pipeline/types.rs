//! Shared types for the digest pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Maximum body length kept from an inbound message, in characters.
pub const MAX_BODY_CHARS: usize = 1000;

// ── Inbound message ─────────────────────────────────────────────────

/// One normalized inbound mailbox item.
///
/// Built once by the message source; the body is truncated at construction
/// and never re-read from the provider afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-assigned id, the dedup key.
    pub id: String,
    pub subject: String,
    /// Raw `From` header, e.g. `"Jane Doe" <jane@x.com>`.
    pub sender: String,
    /// Raw `Date` header, unparsed.
    pub date_raw: String,
    /// Plain-text body, at most `MAX_BODY_CHARS` characters.
    pub body: String,
    /// Provider-supplied preview.
    pub snippet: String,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        sender: impl Into<String>,
        date_raw: impl Into<String>,
        body: &str,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            sender: sender.into(),
            date_raw: date_raw.into(),
            body: body.chars().take(MAX_BODY_CHARS).collect(),
            snippet: snippet.into(),
        }
    }
}

// ── Analysis ────────────────────────────────────────────────────────

/// How much attention a message deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Importance {
    #[serde(rename = "ALTA", alias = "HIGH")]
    High,
    #[serde(rename = "MEDIA", alias = "MEDIUM")]
    Medium,
    #[serde(rename = "BAJA", alias = "LOW")]
    Low,
}

impl Importance {
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// Business category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "TRABAJO", alias = "WORK")]
    Work,
    #[serde(rename = "PERSONAL")]
    Personal,
    #[serde(rename = "CLIENTE", alias = "CLIENT")]
    Client,
    #[serde(rename = "PROVEEDOR", alias = "VENDOR")]
    Vendor,
    #[serde(rename = "MARKETING")]
    Marketing,
    #[serde(rename = "SPAM")]
    Spam,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "WORK",
            Self::Personal => "PERSONAL",
            Self::Client => "CLIENT",
            Self::Vendor => "VENDOR",
            Self::Marketing => "MARKETING",
            Self::Spam => "SPAM",
        }
    }
}

/// Tone of the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "POSITIVO", alias = "POSITIVE")]
    Positive,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[serde(rename = "NEGATIVO", alias = "NEGATIVE")]
    Negative,
    #[serde(rename = "ENFADADO", alias = "ANGRY")]
    Angry,
}

/// Structured judgment for one message.
///
/// The serde field names are the wire keys the classifier prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(rename = "importancia")]
    pub importance: Importance,
    #[serde(rename = "categoria")]
    pub category: Category,
    #[serde(rename = "emocion")]
    pub sentiment: Sentiment,
    #[serde(rename = "requiere_accion")]
    pub requires_action: bool,
    #[serde(rename = "es_urgente")]
    pub is_urgent: bool,
    /// At most two lines.
    #[serde(rename = "resumen")]
    pub summary: String,
    #[serde(rename = "acciones_sugeridas")]
    pub suggested_actions: Vec<String>,
    /// Distinct keywords in first-seen order.
    #[serde(rename = "palabras_clave")]
    pub keywords: Vec<String>,
}

impl Analysis {
    /// Fixed judgment used whenever classification fails.
    pub fn fallback() -> Self {
        Self {
            importance: Importance::Medium,
            category: Category::Work,
            sentiment: Sentiment::Neutral,
            requires_action: false,
            is_urgent: false,
            summary: "pending manual review".to_string(),
            suggested_actions: vec!["review manually".to_string()],
            keywords: Vec::new(),
        }
    }

    /// Whether this message belongs in the "attention required" section.
    pub fn needs_attention(&self) -> bool {
        self.importance == Importance::High || self.is_urgent
    }
}

// ── Notifier trait ──────────────────────────────────────────────────

/// Messaging sink for the digest. Pure I/O, no business logic.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name (e.g. "whatsapp", "telegram").
    fn name(&self) -> &str;

    /// Deliver `text` to the configured recipient.
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}
