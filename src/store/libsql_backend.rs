//! libSQL backend — async `Ledger` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::pipeline::types::{Analysis, Message};
use crate::store::migrations;
use crate::store::traits::{Ledger, LedgerEntry};

/// Column list for entry reads, in `row_to_entry` order.
const ENTRY_COLUMNS: &str = "id, processed_at, subject, sender, importance_level, summary";

/// libSQL ledger backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlLedger {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlLedger {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let ledger = Self::from_database(db)?;
        migrations::run_migrations(&ledger.conn).await?;
        info!(path = %path.display(), "Ledger opened");
        Ok(ledger)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, LedgerError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                LedgerError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let ledger = Self::from_database(db)?;
        migrations::run_migrations(&ledger.conn).await?;
        Ok(ledger)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, LedgerError> {
        let conn = db
            .connect()
            .map_err(|e| LedgerError::Connection(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_entry(row: &libsql::Row) -> Result<LedgerEntry, libsql::Error> {
    let processed_at: String = row.get(1)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        processed_at: parse_datetime(&processed_at),
        subject: row.get(2)?,
        sender: row.get(3)?,
        importance_level: row.get(4)?,
        summary: row.get(5)?,
    })
}

#[async_trait]
impl Ledger for LibSqlLedger {
    async fn has_processed(&self, id: &str) -> Result<bool, LedgerError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM processed_emails WHERE id = ?1 LIMIT 1",
                params![id],
            )
            .await
            .map_err(|e| LedgerError::Query(format!("has_processed: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| LedgerError::Query(format!("has_processed: {e}")))?;
        Ok(row.is_some())
    }

    async fn record(&self, message: &Message, analysis: &Analysis) -> Result<(), LedgerError> {
        self.conn
            .execute(
                "INSERT INTO processed_emails
                    (id, processed_at, subject, sender, importance_level, summary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (id) DO UPDATE SET
                    processed_at = excluded.processed_at,
                    subject = excluded.subject,
                    sender = excluded.sender,
                    importance_level = excluded.importance_level,
                    summary = excluded.summary",
                params![
                    message.id.as_str(),
                    Utc::now().to_rfc3339(),
                    message.subject.as_str(),
                    message.sender.as_str(),
                    analysis.importance.label(),
                    analysis.summary.as_str(),
                ],
            )
            .await
            .map_err(|e| LedgerError::Query(format!("record: {e}")))?;

        debug!(id = %message.id, "Ledger entry recorded");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ENTRY_COLUMNS} FROM processed_emails WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| LedgerError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_entry(&row)
                .map(Some)
                .map_err(|e| LedgerError::Query(format!("row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(LedgerError::Query(format!("get: {e}"))),
        }
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM processed_emails", ())
            .await
            .map_err(|e| LedgerError::Query(format!("count: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| LedgerError::Query(format!("count: {e}")))?;
        match row {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| LedgerError::Query(format!("count: {e}")))?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            None => Ok(0),
        }
    }
}
