//! Daily mail digest pipeline.
//!
//! One run flows through:
//! 1. `MessageSource::fetch_candidates()`: mailbox search, ledger dedup, normalize
//! 2. `Classifier::classify()`: LLM judgment, fallback on any failure
//! 3. `Ledger::record()`: upsert right after each judgment
//! 4. `build_digest()`: pure text assembly
//! 5. `Notifier::send()`: exactly once per run

pub mod classifier;
pub mod digest;
pub mod orchestrator;
pub mod rules;
pub mod scheduler;
pub mod source;
pub mod types;

pub use classifier::{Classified, Classifier};
pub use orchestrator::{Pipeline, PipelineState, RunOutcome, RunReport};
pub use rules::PriorityRules;
pub use scheduler::DigestScheduler;
pub use source::{MailboxClient, MailboxQuery, MessageSource};
pub use types::{Analysis, Category, Importance, Message, Notifier, Sentiment};
