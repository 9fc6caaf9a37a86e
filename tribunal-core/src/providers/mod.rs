//! LLM provider implementations.
//!
//! Every supported provider speaks the OpenAI chat completions protocol, so a
//! single [`OpenAiCompatibleProvider`] covers OpenRouter, OpenAI and local
//! servers. Use [`create_provider`] to build one from [`LlmConfig`].

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;
use tracing::info;

pub use openai_compat::OpenAiCompatibleProvider;

/// Providers accepted in `LlmConfig::provider`.
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["openrouter", "openai", "local"];

/// Create an LLM provider based on the configuration.
///
/// `default_model` is used for requests that do not name a model; jurors
/// always name theirs.
pub fn create_provider(
    config: &LlmConfig,
    default_model: &str,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    if !SUPPORTED_PROVIDERS.contains(&config.provider.as_str()) {
        return Err(LlmError::ApiRequest {
            message: format!(
                "Unsupported LLM provider '{}'. Supported providers: {}",
                config.provider,
                SUPPORTED_PROVIDERS.join(", ")
            ),
        });
    }
    let provider = OpenAiCompatibleProvider::new(config, default_model)?;
    info!(
        provider = config.provider.as_str(),
        base_url = provider.base_url(),
        "LLM provider ready"
    );
    Ok(Arc::new(provider))
}
