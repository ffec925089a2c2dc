//! External I/O: the Gmail mailbox and the digest notifiers.

pub mod console;
pub mod gmail;
pub mod gmail_auth;
pub mod gmail_types;
pub mod telegram;
pub mod whatsapp;

pub use console::ConsoleNotifier;
pub use gmail::GmailClient;
pub use gmail_auth::TokenManager;
pub use telegram::TelegramNotifier;
pub use whatsapp::WhatsAppNotifier;

use std::sync::Arc;
use std::time::Duration;

use crate::config::NotifierConfig;
use crate::error::NotifyError;
use crate::pipeline::types::Notifier;

/// Per-request timeout for notifier HTTP calls.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the configured digest notifier.
pub fn create_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    Ok(match config {
        NotifierConfig::WhatsApp {
            token,
            phone_number_id,
            recipient,
        } => Arc::new(WhatsAppNotifier::new(
            token.clone(),
            phone_number_id.clone(),
            recipient.clone(),
        )?),
        NotifierConfig::Telegram { bot_token, chat_id } => {
            Arc::new(TelegramNotifier::new(bot_token.clone(), chat_id.clone())?)
        }
        NotifierConfig::Console => Arc::new(ConsoleNotifier::new()),
    })
}

/// HTTP client for a notifier channel, bounded by `timeout` per request.
fn http_client(name: &str, timeout: Duration) -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NotifyError::SendFailed {
            name: name.to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}
