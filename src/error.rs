//! Error types for the mail digest pipeline.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Mailbox error: {0}")]
    Source(#[from] SourceError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Dedup ledger storage errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Mailbox provider errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Mailbox authentication failed: {0}")]
    Auth(String),

    #[error("Mailbox request failed: {0}")]
    Request(String),

    #[error("Mailbox returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed mailbox payload: {0}")]
    Payload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Classification failures. Never escape the classifier: each one is
/// converted into the fallback analysis.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Response parse failed: {0}")]
    Parse(String),

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Messaging delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} rejected the message with status {status}: {body}")]
    Rejected {
        name: String,
        status: u16,
        body: String,
    },
}

/// Failures that abort a run and route it through the error notification.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
