//! LLM provider abstraction.
//!
//! Defines the `LlmProvider` trait for model-agnostic chat completions used
//! by LLM-backed jurors, plus a scriptable mock for tests and dry runs.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the default model name.
    fn model_name(&self) -> &str;
}

enum MockReply {
    Response(CompletionResponse),
    Failure(String),
}

/// A mock LLM provider for testing and development.
///
/// Replies are served in queue order. Once the queue is empty a fixed
/// placeholder text is returned.
pub struct MockLlmProvider {
    model: String,
    delay: Option<Duration>,
    replies: Mutex<Vec<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            delay: None,
            replies: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    ///
    /// Queues multiple copies of the response so it can handle multiple calls.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_response(Self::text_response(text));
        }
        provider
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        lock(&self.replies).push(MockReply::Response(response));
    }

    /// Queue a transport failure for the next `complete` call.
    pub fn queue_failure(&self, message: &str) {
        lock(&self.replies).push(MockReply::Failure(message.to_string()));
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Create a refusal response for testing.
    pub fn refusal_response(reason: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::new(
                Role::Assistant,
                Content::Refusal {
                    reason: reason.to_string(),
                },
            ),
            usage: TokenUsage::default(),
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        lock(&self.requests).push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = {
            let mut replies = lock(&self.replies);
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        };
        match next {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Failure(message)) => Err(LlmError::ApiRequest { message }),
            None => Ok(MockLlmProvider::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_default_response() {
        let provider = MockLlmProvider::new();
        let response = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert!(response.message.content.as_text().is_some());
    }

    #[tokio::test]
    async fn test_mock_provider_queued_responses() {
        let provider = MockLlmProvider::new();
        provider.queue_response(MockLlmProvider::text_response("first"));
        provider.queue_failure("connection reset");
        provider.queue_response(MockLlmProvider::text_response("second"));

        let r1 = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(r1.message.content.as_text(), Some("first"));

        let err = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ApiRequest { .. }));

        let r3 = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(r3.message.content.as_text(), Some("second"));
    }

    #[tokio::test]
    async fn test_mock_provider_records_requests() {
        let provider = MockLlmProvider::with_response("ok");
        let request = CompletionRequest {
            messages: vec![Message::user("judge this")],
            model: Some("judge-model".into()),
            ..Default::default()
        };
        provider.complete(request).await.unwrap();

        let seen = provider.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model.as_deref(), Some("judge-model"));
        assert_eq!(provider.model_name(), "mock-model");
    }
}
