//! Message source: turns mailbox payloads into deduplicated `Message`s.
//!
//! Ledger hits are skipped before the detail fetch. A failed search
//! degrades to an empty batch; a failed detail fetch skips that one item,
//! which stays unrecorded and is picked up again next run. Only ledger
//! failures propagate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::channels::gmail_types::RawMessage;
use crate::error::{LedgerError, SourceError};
use crate::pipeline::types::Message;
use crate::store::Ledger;

/// Mailbox search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxQuery {
    /// Oldest day to include.
    pub since: NaiveDate,
    /// Page size cap.
    pub max_results: u32,
}

impl MailboxQuery {
    /// Provider search string: inbox items after `since`.
    pub fn to_search(&self) -> String {
        format!("after:{} in:inbox", self.since.format("%Y/%m/%d"))
    }
}

/// Mailbox collaborator: search ids, then fetch each payload.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    fn name(&self) -> &str;

    /// Ids of messages matching `query`, newest first.
    async fn search(&self, query: &MailboxQuery) -> Result<Vec<String>, SourceError>;

    /// Full payload of one message.
    async fn fetch(&self, id: &str) -> Result<RawMessage, SourceError>;
}

/// The day before `today`; the lower bound of each daily fetch.
pub fn previous_day(today: NaiveDate) -> NaiveDate {
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

/// Normalize a provider payload. Missing headers become empty strings and a
/// payload without a plain-text part gets an empty body.
pub fn normalize(raw: &RawMessage) -> Message {
    let payload = &raw.payload;
    let body = payload.plain_text().unwrap_or_default();
    Message::new(
        raw.id.clone(),
        payload.header("Subject"),
        payload.header("From"),
        payload.header("Date"),
        &body,
        raw.snippet.clone(),
    )
}

/// Fetches candidate messages that the ledger has not seen yet.
pub struct MessageSource {
    mailbox: Arc<dyn MailboxClient>,
    ledger: Arc<dyn Ledger>,
    page_size: u32,
}

impl MessageSource {
    pub fn new(mailbox: Arc<dyn MailboxClient>, ledger: Arc<dyn Ledger>, page_size: u32) -> Self {
        Self {
            mailbox,
            ledger,
            page_size,
        }
    }

    /// Unprocessed messages received on or after `since`, in mailbox order.
    pub async fn fetch_candidates(&self, since: NaiveDate) -> Result<Vec<Message>, LedgerError> {
        let query = MailboxQuery {
            since,
            max_results: self.page_size,
        };

        let ids = match self.mailbox.search(&query).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(
                    mailbox = self.mailbox.name(),
                    error = %e,
                    "Mailbox search failed, continuing with an empty batch"
                );
                return Ok(Vec::new());
            }
        };

        let total = ids.len();
        let mut messages = Vec::with_capacity(total);
        let mut skipped = 0usize;

        for id in ids {
            if self.ledger.has_processed(&id).await? {
                debug!(id = %id, "Already processed, skipping");
                skipped += 1;
                continue;
            }

            match self.mailbox.fetch(&id).await {
                Ok(raw) => messages.push(normalize(&raw)),
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to fetch message, skipping");
                }
            }
        }

        info!(
            found = total,
            already_processed = skipped,
            candidates = messages.len(),
            "Mailbox fetch complete"
        );
        Ok(messages)
    }
}
