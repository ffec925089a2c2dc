//! VIP/priority rules. Pure pattern matching, no LLM call.
//!
//! A message is priority when its sender contains any VIP entry, or its
//! subject or body contains any critical term. Both checks are
//! case-insensitive substring matches. The digest does not gate on this flag.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::types::Message;

/// Built-in VIP senders.
pub const DEFAULT_VIP_SENDERS: &[&str] = &[
    "cliente@importante.com",
    "jefe@empresa.com",
    "contrato@proveedor.com",
];

/// Built-in critical terms.
pub const DEFAULT_CRITICAL_KEYWORDS: &[&str] = &[
    "urgente",
    "crítico",
    "problema",
    "error",
    "fallo",
    "presupuesto",
    "contrato",
    "factura",
    "pago",
    "reunión",
    "deadline",
    "entrega",
    "proyecto",
];

/// Which message field a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Sender,
    /// Subject and body together.
    Text,
}

/// Why a message was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub field: RuleField,
    /// The matched text as it appears in the message.
    pub matched: String,
}

/// Static VIP and critical-term rule sets, compiled once.
#[derive(Debug, Clone)]
pub struct PriorityRules {
    vip: Option<Regex>,
    critical: Option<Regex>,
}

impl PriorityRules {
    /// Compile rule sets from plain strings. Entries are literal, not patterns.
    pub fn new<S: AsRef<str>>(vip_senders: &[S], critical_keywords: &[S]) -> Result<Self, ConfigError> {
        Ok(Self {
            vip: compile_alternation("MAIL_DIGEST_VIP_SENDERS", vip_senders)?,
            critical: compile_alternation("MAIL_DIGEST_CRITICAL_KEYWORDS", critical_keywords)?,
        })
    }

    /// Rules built from the default lists.
    pub fn default_rules() -> Self {
        Self::new(DEFAULT_VIP_SENDERS, DEFAULT_CRITICAL_KEYWORDS).unwrap_or_else(|_| Self::empty())
    }

    /// Rules that never match.
    pub fn empty() -> Self {
        Self {
            vip: None,
            critical: None,
        }
    }

    /// Whether the message is priority.
    pub fn is_priority(&self, message: &Message) -> bool {
        self.evaluate(message).is_some()
    }

    /// First matching rule, VIP sender checked before critical terms.
    pub fn evaluate(&self, message: &Message) -> Option<RuleMatch> {
        if let Some(m) = self.vip.as_ref().and_then(|re| re.find(&message.sender)) {
            debug!(id = %message.id, matched = m.as_str(), "VIP sender");
            return Some(RuleMatch {
                field: RuleField::Sender,
                matched: m.as_str().to_string(),
            });
        }

        let critical = self.critical.as_ref()?;
        let text = format!("{} {}", message.subject, message.body);
        critical.find(&text).map(|m| {
            debug!(id = %message.id, matched = m.as_str(), "Critical term");
            RuleMatch {
                field: RuleField::Text,
                matched: m.as_str().to_string(),
            }
        })
    }
}

/// One case-insensitive alternation of escaped literals, or `None` when empty.
fn compile_alternation<S: AsRef<str>>(key: &str, items: &[S]) -> Result<Option<Regex>, ConfigError> {
    let escaped: Vec<String> = items
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&escaped.join("|"))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}
