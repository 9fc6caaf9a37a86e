//! LLM-backed juror invocation.

use super::parse::parse_judgment;
use super::prompt::{DEFAULT_JUROR_SYSTEM_PROMPT, build_evaluation_prompt};
use super::{JurorInvoker, RawJudgment};
use crate::brain::LlmProvider;
use crate::config::{CriterionConfig, JurorConfig};
use crate::error::JurorError;
use crate::types::{CompletionRequest, Content, Message, ResponseCandidate};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Asks an LLM for a judgment with one chat completion per attempt.
///
/// The juror's `model_name` and `temperature` are sent with every request,
/// so one provider can serve every juror in a jury.
pub struct LlmJuror {
    provider: Arc<dyn LlmProvider>,
    max_tokens: Option<usize>,
    require_explanation: bool,
}

impl LlmJuror {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_tokens: None,
            require_explanation: true,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Whether the prompt asks for an explanation on every score.
    pub fn with_require_explanation(mut self, require: bool) -> Self {
        self.require_explanation = require;
        self
    }

    fn build_request(
        &self,
        juror: &JurorConfig,
        prompt: &str,
        responses: &[ResponseCandidate],
        criteria: &[CriterionConfig],
    ) -> CompletionRequest {
        let system = juror
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_JUROR_SYSTEM_PROMPT);
        CompletionRequest {
            messages: vec![
                Message::system(system),
                Message::user(build_evaluation_prompt(
                    prompt,
                    responses,
                    criteria,
                    self.require_explanation,
                )),
            ],
            temperature: juror.temperature,
            max_tokens: self.max_tokens,
            model: Some(juror.model_name.clone()),
        }
    }
}

#[async_trait]
impl JurorInvoker for LlmJuror {
    async fn invoke(
        &self,
        juror: &JurorConfig,
        prompt: &str,
        responses: &[ResponseCandidate],
        criteria: &[CriterionConfig],
    ) -> Result<RawJudgment, JurorError> {
        let request = self.build_request(juror, prompt, responses, criteria);
        let response = self.provider.complete(request).await?;
        debug!(
            juror = juror.name.as_str(),
            model = response.model.as_str(),
            output_tokens = response.usage.output_tokens,
            "Juror reply received"
        );

        match &response.message.content {
            Content::Text { text } => parse_judgment(text, criteria),
            Content::Refusal { reason } => Err(JurorError::Invocation {
                message: format!("model refused to evaluate: {reason}"),
            }),
        }
    }
}
