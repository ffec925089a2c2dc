//! Pipeline orchestrator — one digest run, start to notification.
//!
//! `IDLE → FETCHING → CLASSIFYING → DIGESTING → NOTIFYING → IDLE`, with
//! `ERROR → NOTIFYING` reachable from any working state. Every `run()` makes
//! exactly one notification attempt and returns a report, never an error.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError};
use crate::llm::provider::LlmProvider;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::digest::{NO_MAIL_TEXT, build_digest, error_text};
use crate::pipeline::rules::PriorityRules;
use crate::pipeline::source::{MailboxClient, MessageSource, previous_day};
use crate::pipeline::types::Notifier;
use crate::store::Ledger;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Classifying,
    Digesting,
    Notifying,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Digesting => "digesting",
            Self::Notifying => "notifying",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// What a run ended up sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No unprocessed mail; the fixed no-mail text was sent.
    NoMail,
    /// A digest was built over this run's messages.
    Digest,
    /// The run aborted; the error text was sent.
    Failed,
}

/// Summary of one `run()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// Unprocessed messages returned by the source.
    pub fetched: usize,
    /// Messages classified and recorded in the ledger.
    pub classified: usize,
    /// Classifications that used the fallback analysis.
    pub fallbacks: usize,
    /// Messages flagged by the VIP/critical-term rules.
    pub priority: usize,
    /// Whether the single notification was accepted by the channel.
    pub delivered: bool,
    /// Cause of a failed run.
    pub error: Option<String>,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::NoMail,
            fetched: 0,
            classified: 0,
            fallbacks: 0,
            priority: 0,
            delivered: false,
            error: None,
        }
    }
}

/// Sequences source, classifier, ledger, digest and notifier for one run.
///
/// `run` takes `&mut self`, so two runs on the same pipeline cannot overlap.
pub struct Pipeline {
    source: MessageSource,
    classifier: Classifier,
    rules: PriorityRules,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        mailbox: Arc<dyn MailboxClient>,
        llm: Arc<dyn LlmProvider>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            source: MessageSource::new(mailbox, Arc::clone(&ledger), config.page_size),
            classifier: Classifier::new(llm, config.context.clone()),
            rules: PriorityRules::new(
                config.vip_senders.as_slice(),
                config.critical_keywords.as_slice(),
            )?,
            ledger,
            notifier,
            state: PipelineState::Idle,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run once against the current local time.
    pub async fn run(&mut self) -> RunReport {
        self.run_at(Local::now()).await
    }

    /// Run once as if at `now`: fetch from the previous calendar day and
    /// stamp the digest with `now`.
    pub async fn run_at(&mut self, now: DateTime<Local>) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", %run_id);
        self.execute(run_id, now).instrument(span).await
    }

    async fn execute(&mut self, run_id: Uuid, now: DateTime<Local>) -> RunReport {
        let mut report = RunReport::new(run_id);
        info!("Starting digest run");

        let text = match self.collect(&mut report, now).await {
            Ok(text) => text,
            Err(e) => {
                self.transition(PipelineState::Error);
                error!(error = %e, "Digest run failed");
                report.outcome = RunOutcome::Failed;
                report.error = Some(e.to_string());
                error_text(&e)
            }
        };

        self.transition(PipelineState::Notifying);
        match self.notifier.send(&text).await {
            Ok(()) => {
                report.delivered = true;
                info!(channel = self.notifier.name(), "Notification sent");
            }
            Err(e) if report.outcome == RunOutcome::Failed => {
                warn!(
                    channel = self.notifier.name(),
                    error = %e,
                    "Error notification could not be delivered"
                );
            }
            Err(e) => {
                error!(
                    channel = self.notifier.name(),
                    error = %e,
                    "Digest notification failed"
                );
            }
        }

        self.transition(PipelineState::Idle);
        info!(
            outcome = ?report.outcome,
            fetched = report.fetched,
            classified = report.classified,
            fallbacks = report.fallbacks,
            priority = report.priority,
            delivered = report.delivered,
            "Digest run complete"
        );
        report
    }

    /// FETCHING through DIGESTING. Returns the text to notify.
    async fn collect(
        &mut self,
        report: &mut RunReport,
        now: DateTime<Local>,
    ) -> Result<String, PipelineError> {
        self.transition(PipelineState::Fetching);
        let since = previous_day(now.date_naive());
        let candidates = self.source.fetch_candidates(since).await?;
        report.fetched = candidates.len();

        if candidates.is_empty() {
            report.outcome = RunOutcome::NoMail;
            return Ok(NO_MAIL_TEXT.to_string());
        }

        self.transition(PipelineState::Classifying);
        let mut pairs = Vec::with_capacity(candidates.len());
        for message in candidates {
            let classified = self.classifier.classify(&message).await;
            if classified.used_fallback {
                report.fallbacks += 1;
            }
            if self.rules.is_priority(&message) {
                report.priority += 1;
            }

            self.ledger.record(&message, &classified.analysis).await?;
            report.classified += 1;
            pairs.push((message, classified.analysis));
        }

        self.transition(PipelineState::Digesting);
        report.outcome = RunOutcome::Digest;
        Ok(build_digest(&pairs, now.time()))
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }
}
