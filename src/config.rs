//! Configuration types, loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use cron::Schedule;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::pipeline::classifier::DEFAULT_CONTEXT;
use crate::pipeline::rules::{DEFAULT_CRITICAL_KEYWORDS, DEFAULT_VIP_SENDERS};
use crate::pipeline::scheduler::{DEFAULT_SCHEDULE, parse_schedule};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_DB_PATH: &str = "./data/email_tracking.db";
const DEFAULT_TOKEN_PATH: &str = "./token.json";
const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
const DEFAULT_PAGE_SIZE: u32 = 50;

/// Full agent configuration. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub llm: LlmConfig,
    pub gmail: GmailConfig,
    pub pipeline: PipelineConfig,
    pub notifier: NotifierConfig,
    /// Ledger database file.
    pub db_path: PathBuf,
    pub schedule: Schedule,
    /// Directory for the daily rolling log file, if any.
    pub log_dir: Option<PathBuf>,
}

/// Gmail REST access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailConfig {
    pub api_base: String,
    /// Authorized-user token file.
    pub token_path: PathBuf,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GMAIL_API_BASE.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
        }
    }
}

/// Settings handed to the orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Mailbox search page size.
    pub page_size: u32,
    pub vip_senders: Vec<String>,
    pub critical_keywords: Vec<String>,
    /// Domain framing for the classifier prompt.
    pub context: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            vip_senders: DEFAULT_VIP_SENDERS.iter().map(|s| s.to_string()).collect(),
            critical_keywords: DEFAULT_CRITICAL_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

/// Which channel receives the digest.
#[derive(Debug, Clone)]
pub enum NotifierConfig {
    WhatsApp {
        token: SecretString,
        phone_number_id: String,
        recipient: String,
    },
    Telegram {
        bot_token: SecretString,
        chat_id: String,
    },
    /// Print to stdout.
    Console,
}

impl NotifierConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WhatsApp { .. } => "whatsapp",
            Self::Telegram { .. } => "telegram",
            Self::Console => "console",
        }
    }
}

impl DigestConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = match get("MAIL_DIGEST_LLM_BACKEND") {
            Some(raw) => LlmBackend::from_str(&raw).map_err(|message| ConfigError::InvalidValue {
                key: "MAIL_DIGEST_LLM_BACKEND".to_string(),
                message,
            })?,
            None => LlmBackend::OpenAi,
        };
        let key_var = match backend {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;
        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(api_key),
            model: get("MAIL_DIGEST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        let gmail = GmailConfig {
            api_base: get("GMAIL_API_BASE").unwrap_or_else(|| DEFAULT_GMAIL_API_BASE.to_string()),
            token_path: get("GMAIL_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
        };

        let defaults = PipelineConfig::default();
        let page_size = match get("MAIL_DIGEST_PAGE_SIZE") {
            Some(raw) => parse_page_size(&raw)?,
            None => defaults.page_size,
        };
        let pipeline = PipelineConfig {
            page_size,
            vip_senders: get("MAIL_DIGEST_VIP_SENDERS")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.vip_senders),
            critical_keywords: get("MAIL_DIGEST_CRITICAL_KEYWORDS")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.critical_keywords),
            context: get("MAIL_DIGEST_CONTEXT").unwrap_or(defaults.context),
        };

        let notifier = if let Some(token) = get("WHATSAPP_TOKEN") {
            NotifierConfig::WhatsApp {
                token: SecretString::from(token),
                phone_number_id: get("WHATSAPP_PHONE_NUMBER_ID").ok_or_else(|| {
                    ConfigError::MissingRequired {
                        key: "WHATSAPP_PHONE_NUMBER_ID".to_string(),
                        hint: "Required when WHATSAPP_TOKEN is set.".to_string(),
                    }
                })?,
                recipient: get("MY_PHONE_NUMBER").ok_or_else(|| ConfigError::MissingRequired {
                    key: "MY_PHONE_NUMBER".to_string(),
                    hint: "Required when WHATSAPP_TOKEN is set.".to_string(),
                })?,
            }
        } else if let Some(bot_token) = get("TELEGRAM_BOT_TOKEN") {
            NotifierConfig::Telegram {
                bot_token: SecretString::from(bot_token),
                chat_id: get("TELEGRAM_CHAT_ID").ok_or_else(|| ConfigError::MissingRequired {
                    key: "TELEGRAM_CHAT_ID".to_string(),
                    hint: "Required when TELEGRAM_BOT_TOKEN is set.".to_string(),
                })?,
            }
        } else {
            NotifierConfig::Console
        };

        let schedule_expr = get("MAIL_DIGEST_SCHEDULE").unwrap_or_else(|| DEFAULT_SCHEDULE.to_string());

        Ok(Self {
            llm,
            gmail,
            pipeline,
            notifier,
            db_path: get("MAIL_DIGEST_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            schedule: parse_schedule(&schedule_expr)?,
            log_dir: get("MAIL_DIGEST_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Comma-separated list, entries trimmed, empties dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_page_size(raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::InvalidValue {
            key: "MAIL_DIGEST_PAGE_SIZE".to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            key: "MAIL_DIGEST_PAGE_SIZE".to_string(),
            message: format!("'{raw}': {e}"),
        }),
    }
}
