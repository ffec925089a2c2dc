//! `Ledger` trait: the at-most-once processing record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::pipeline::types::{Analysis, Message};

/// Durable record of a processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: String,
    pub processed_at: DateTime<Utc>,
    pub subject: String,
    pub sender: String,
    pub importance_level: String,
    pub summary: String,
}

/// Backend-agnostic dedup ledger.
///
/// An entry for an id means that message is never classified or notified
/// again. Writers are not expected to run concurrently.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// True iff an entry with this id exists.
    async fn has_processed(&self, id: &str) -> Result<bool, LedgerError>;

    /// Upsert an entry for `message`. Re-recording overwrites the row.
    async fn record(&self, message: &Message, analysis: &Analysis) -> Result<(), LedgerError>;

    /// Load a single entry.
    async fn get(&self, id: &str) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Number of entries.
    async fn count(&self) -> Result<u64, LedgerError>;
}
