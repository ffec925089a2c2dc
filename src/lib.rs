//! Mail digest: daily inbox triage delivered as one message.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;
