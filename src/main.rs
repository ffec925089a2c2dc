use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mail_digest::channels::{GmailClient, create_notifier};
use mail_digest::config::DigestConfig;
use mail_digest::llm::create_provider;
use mail_digest::pipeline::{DigestScheduler, Pipeline};
use mail_digest::store::{Ledger, LibSqlLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DigestConfig::from_env().context("failed to load configuration")?;

    // Held for the life of the process so buffered file logs are flushed.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📬 Mail digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Ledger: {}", config.db_path.display());
    eprintln!("   Notifier: {}", config.notifier.name());

    let mut pipeline = build_pipeline(&config)
        .await
        .context("failed to initialize pipeline")?;

    let scheduler = DigestScheduler::new(config.schedule.clone());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let runs = scheduler.run(&mut pipeline, shutdown).await;
    info!(runs, "Mail digest stopped");
    Ok(())
}

/// Wire the ledger, Gmail client, LLM and notifier into a pipeline.
async fn build_pipeline(config: &DigestConfig) -> mail_digest::error::Result<Pipeline> {
    let llm = create_provider(&config.llm)?;

    let ledger: Arc<dyn Ledger> = Arc::new(LibSqlLedger::new_local(&config.db_path).await?);
    match ledger.count().await {
        Ok(count) => info!(processed = count, "Ledger ready"),
        Err(e) => warn!(error = %e, "Could not count ledger entries"),
    }

    let gmail = Arc::new(GmailClient::new(&config.gmail)?);
    match gmail.profile().await {
        Ok(profile) => info!(
            account = %profile.email_address,
            messages_total = profile.messages_total,
            "Connected to Gmail"
        ),
        Err(e) => warn!(error = %e, "Gmail connectivity check failed; runs will report no mail until fixed"),
    }

    let notifier = create_notifier(&config.notifier)?;
    Ok(Pipeline::new(&config.pipeline, gmail, llm, ledger, notifier)?)
}

/// Stdout logging, plus a daily rolling file under `log_dir` when set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mail-digest.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}
