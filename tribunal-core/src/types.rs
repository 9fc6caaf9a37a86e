//! Core type definitions for Tribunal.
//!
//! Defines the data shared across the pipeline: candidate responses, the
//! per-juror evaluation record, and the chat message types exchanged with
//! LLM providers.

use crate::error::{JurorError, JurorErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One candidate text being judged, identified by a stable id for the
/// duration of an evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCandidate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl ResponseCandidate {
    /// Create a candidate with a generated `response_<hex>` id.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_id(format!("response_{}", Uuid::new_v4().simple()), content)
    }

    /// Create a candidate with an explicit id.
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alias: None,
            content: content.into(),
            model_name: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn model_name(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// The alias if one was given, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }
}

/// Why a juror ended without a usable evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurorFailure {
    pub kind: JurorErrorKind,
    pub message: String,
}

impl From<&JurorError> for JurorFailure {
    fn from(err: &JurorError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Scores keyed by response id, then criterion name.
pub type ScoreSheet = BTreeMap<String, BTreeMap<String, u32>>;

/// Explanations keyed by response id, then criterion name.
pub type ExplanationSheet = BTreeMap<String, BTreeMap<String, String>>;

/// The terminal outcome of one juror for one evaluation call.
///
/// A succeeded evaluation carries a score for every candidate and every
/// criterion; a failed one carries no scores and a populated `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurorEvaluation {
    pub juror_name: String,
    pub juror_weight: f64,
    #[serde(default)]
    pub scores: ScoreSheet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub explanations: ExplanationSheet,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JurorFailure>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl JurorEvaluation {
    /// Look up a single score.
    pub fn score(&self, response_id: &str, criterion: &str) -> Option<u32> {
        self.scores.get(response_id)?.get(criterion).copied()
    }

    /// Sum of all criterion scores this juror gave a response.
    pub fn total_for(&self, response_id: &str) -> u64 {
        self.scores
            .get(response_id)
            .map(|by_criterion| by_criterion.values().copied().map(u64::from).sum())
            .unwrap_or(0)
    }
}

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Content within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
    /// The model declined to answer.
    Refusal { reason: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Returns the text representation of this content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            Content::Refusal { .. } => None,
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Content,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message with auto-generated ID and current timestamp.
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, Content::text(text))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, Content::text(text))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Content::text(text))
    }
}

/// Token usage statistics from an LLM call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// The result of an LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: Message,
    pub usage: TokenUsage,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// A request to the LLM for completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub model: Option<String>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: 0.1,
            max_tokens: None,
            model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_generated_id() {
        let candidate = ResponseCandidate::new("Paris is the capital of France.");
        assert!(candidate.id.starts_with("response_"));
        assert_eq!(candidate.id.len(), "response_".len() + 32);
        assert_eq!(candidate.display_name(), candidate.id);
    }

    #[test]
    fn test_candidate_display_name_prefers_alias() {
        let candidate = ResponseCandidate::with_id("a", "text")
            .alias("GPT answer")
            .model_name("gpt-4o");
        assert_eq!(candidate.display_name(), "GPT answer");
        assert_eq!(candidate.model_name.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_candidate_serde_skips_empty_fields() {
        let json = serde_json::to_value(ResponseCandidate::with_id("a", "text")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "a", "content": "text"}));
    }

    #[test]
    fn test_juror_evaluation_lookup() {
        let mut scores = ScoreSheet::new();
        scores.insert(
            "a".into(),
            BTreeMap::from([("accuracy".to_string(), 4), ("clarity".to_string(), 3)]),
        );
        let eval = JurorEvaluation {
            juror_name: "j1".into(),
            juror_weight: 1.0,
            scores,
            explanation: None,
            explanations: BTreeMap::new(),
            succeeded: true,
            error: None,
            attempts: 1,
            duration_ms: 12,
        };
        assert_eq!(eval.score("a", "accuracy"), Some(4));
        assert_eq!(eval.score("a", "missing"), None);
        assert_eq!(eval.score("b", "accuracy"), None);
        assert_eq!(eval.total_for("a"), 7);
        assert_eq!(eval.total_for("b"), 0);

        let mut wide = eval.clone();
        wide.scores.insert(
            "c".into(),
            BTreeMap::from([("x".to_string(), u32::MAX), ("y".to_string(), u32::MAX)]),
        );
        assert_eq!(wide.total_for("c"), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_failure_from_juror_error() {
        let failure = JurorFailure::from(&JurorError::Timeout { timeout_secs: 3 });
        assert_eq!(failure.kind, JurorErrorKind::Timeout);
        assert_eq!(failure.message, "Juror attempt timed out after 3s");
    }

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello, world!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.as_text(), Some("Hello, world!"));
    }

    #[test]
    fn test_refusal_has_no_text() {
        let content = Content::Refusal {
            reason: "policy".into(),
        };
        assert_eq!(content.as_text(), None);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
