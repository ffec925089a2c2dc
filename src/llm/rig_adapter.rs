//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionError, CompletionModel};
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::costs::model_cost;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

/// `LlmProvider` backed by any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }

    fn map_error(&self, err: CompletionError) -> LlmError {
        let reason = err.to_string();
        if reason.contains("429") || reason.to_lowercase().contains("rate limit") {
            LlmError::RateLimited {
                provider: self.provider.to_string(),
                retry_after: None,
            }
        } else if reason.contains("401") || reason.contains("403") {
            LlmError::AuthFailed {
                provider: self.provider.to_string(),
            }
        } else {
            LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason,
            }
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = self.model.completion_request(request.user_prompt());
        if let Some(preamble) = request.system_prompt() {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "empty completion".to_string(),
            });
        }

        let output_tokens = u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX);
        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens,
            finish_reason: finish_reason(output_tokens, request.max_tokens),
        })
    }
}

/// rig does not surface the provider's stop reason, so a response that used
/// the whole token budget is treated as cut off.
fn finish_reason(output_tokens: u32, max_tokens: Option<u32>) -> FinishReason {
    match max_tokens {
        Some(max) if output_tokens >= max => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_at_token_cap_is_length() {
        assert_eq!(finish_reason(512, Some(512)), FinishReason::Length);
        assert_eq!(finish_reason(600, Some(512)), FinishReason::Length);
    }

    #[test]
    fn output_under_cap_is_stop() {
        assert_eq!(finish_reason(80, Some(512)), FinishReason::Stop);
        assert_eq!(finish_reason(4000, None), FinishReason::Stop);
    }
}
