//! Classifier: asks the LLM for a structured judgment of one message.
//!
//! Parsing is strict: any missing field or unknown enum value fails the
//! decode. Every failure (provider error, timeout, malformed JSON) collapses
//! into `Analysis::fallback()`; nothing escapes `classify`. No retries here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ClassifyError;
use crate::llm::costs::call_cost;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::types::{Analysis, Message};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Temperature for classification.
const CLASSIFY_TEMPERATURE: f32 = 0.3;

/// Deadline for one classification call.
pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default domain framing appended to every prompt.
pub const DEFAULT_CONTEXT: &str = "I'm an advertiser and copywriter. \
     Prioritize client emails, projects and business opportunities.";

/// Result of one classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub analysis: Analysis,
    /// True when the analysis is the fixed fallback.
    pub used_fallback: bool,
}

/// LLM-backed message classifier.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    context: String,
    timeout: Duration,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>, context: impl Into<String>) -> Self {
        Self {
            llm,
            context: context.into(),
            timeout: CLASSIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a message. Never fails: errors yield the fallback analysis.
    pub async fn classify(&self, message: &Message) -> Classified {
        match self.try_classify(message).await {
            Ok(analysis) => Classified {
                analysis,
                used_fallback: false,
            },
            Err(e) => {
                warn!(
                    id = %message.id,
                    error = %e,
                    "Classification failed, using fallback analysis"
                );
                Classified {
                    analysis: Analysis::fallback(),
                    used_fallback: true,
                }
            }
        }
    }

    /// Classify a message, surfacing the failure cause.
    pub async fn try_classify(&self, message: &Message) -> Result<Analysis, ClassifyError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(message, &self.context)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout))??;

        let cost = call_cost(
            self.llm.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        info!(
            id = %message.id,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            "Message classified"
        );

        if response.finish_reason == FinishReason::Length {
            warn!(
                id = %message.id,
                max_tokens = CLASSIFY_MAX_TOKENS,
                "Classification response hit the token cap"
            );
        }

        parse_analysis(&response.content).inspect_err(|e| {
            debug!(
                id = %message.id,
                raw_response = %response.content,
                error = %e,
                "Unparseable classification response"
            );
        })
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    "You are an email analysis engine. Analyze the email you are given and \
     respond with ONLY a JSON object of exactly this shape:\n\n\
     {\n\
     \x20 \"importancia\": \"ALTA|MEDIA|BAJA\",\n\
     \x20 \"categoria\": \"TRABAJO|PERSONAL|CLIENTE|PROVEEDOR|MARKETING|SPAM\",\n\
     \x20 \"emocion\": \"POSITIVO|NEUTRAL|NEGATIVO|ENFADADO\",\n\
     \x20 \"requiere_accion\": true/false,\n\
     \x20 \"es_urgente\": true/false,\n\
     \x20 \"resumen\": \"summary in at most 2 lines\",\n\
     \x20 \"acciones_sugeridas\": [\"action1\", \"action2\"],\n\
     \x20 \"palabras_clave\": [\"keyword1\", \"keyword2\"]\n\
     }\n\n\
     Rules:\n\
     - Use exactly one of the listed values for importancia, categoria and emocion\n\
     - All eight keys are required\n\
     - Keep the summary to two lines"
        .to_string()
}

fn build_classify_user_prompt(message: &Message, context: &str) -> String {
    let mut prompt = String::with_capacity(512 + message.body.len());

    prompt.push_str("EMAIL:\n");
    prompt.push_str(&format!("From: {}\n", message.sender));
    prompt.push_str(&format!("Subject: {}\n", message.subject));
    prompt.push_str(&format!("Content: {}\n", message.body));

    if !context.is_empty() {
        prompt.push_str(&format!("\nContext: {context}"));
    }

    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Strictly decode an `Analysis` from LLM output.
fn parse_analysis(raw: &str) -> Result<Analysis, ClassifyError> {
    let json_str = extract_json_object(raw);
    let mut analysis: Analysis = serde_json::from_str(&json_str)
        .map_err(|e| ClassifyError::Parse(format!("JSON parse error: {e}")))?;
    dedup_in_order(&mut analysis.keywords);
    Ok(analysis)
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return match trimmed.rfind('}') {
            Some(end) => trimmed[..=end].to_string(),
            None => trimmed.to_string(),
        };
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
