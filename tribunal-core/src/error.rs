//! Error types for the Tribunal core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering configuration, juror invocation, voting, evaluation, and LLM domains.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level error type for the Tribunal core library.
#[derive(Debug, thiserror::Error)]
pub enum TribunalError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Voting error: {0}")]
    Voting(#[from] VotingError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TribunalError {
    /// Whether this error was raised before any juror was invoked.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TribunalError::Config(_)
                | TribunalError::Evaluation(
                    EvaluationError::NoResponses | EvaluationError::DuplicateResponseId { .. }
                )
        )
    }
}

/// Errors from jury configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Duplicate criterion name: {name}")]
    DuplicateCriterion { name: String },

    #[error("Duplicate juror name: {name}")]
    DuplicateJuror { name: String },

    #[error("{kind} '{name}' has non-positive weight {weight}")]
    NonPositiveWeight {
        kind: String,
        name: String,
        weight: f64,
    },

    #[error("Unknown voting method: {value}")]
    UnknownVotingMethod { value: String },

    #[error("Voting method 'custom' requires custom_voting_function to be set")]
    MissingCustomFunction,

    #[error("Custom voting function not registered: {name}")]
    UnknownCustomFunction { name: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A single failed juror attempt. Never escapes the orchestrator; the last
/// one is recorded on the juror's failed evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JurorError {
    #[error("Juror invocation failed: {message}")]
    Invocation { message: String },

    #[error("Juror attempt timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Malformed juror output: {message}")]
    MalformedOutput { message: String },
}

/// Serializable classification of a juror failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurorErrorKind {
    Invocation,
    Timeout,
    MalformedOutput,
}

impl JurorError {
    pub fn kind(&self) -> JurorErrorKind {
        match self {
            JurorError::Invocation { .. } => JurorErrorKind::Invocation,
            JurorError::Timeout { .. } => JurorErrorKind::Timeout,
            JurorError::MalformedOutput { .. } => JurorErrorKind::MalformedOutput,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        JurorError::MalformedOutput {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JurorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JurorErrorKind::Invocation => write!(f, "invocation"),
            JurorErrorKind::Timeout => write!(f, "timeout"),
            JurorErrorKind::MalformedOutput => write!(f, "malformed_output"),
        }
    }
}

impl From<LlmError> for JurorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout { timeout_secs } => JurorError::Timeout { timeout_secs },
            other => JurorError::Invocation {
                message: other.to_string(),
            },
        }
    }
}

/// Errors from the voting engine. All of them abort the evaluation.
#[derive(Debug, thiserror::Error)]
pub enum VotingError {
    #[error("Insufficient evaluations: none of {attempted} jurors produced a valid evaluation")]
    InsufficientEvaluations { attempted: usize },

    #[error("Custom voting function '{function}' violated the result contract: {reason}")]
    CustomContractViolation { function: String, reason: String },

    #[error("Custom voting function not registered: {name}")]
    UnknownCustomFunction { name: String },

    #[error("Custom voting function '{function}' failed: {message}")]
    CustomFunctionFailed { function: String, message: String },
}

/// Errors raised by an evaluation call itself, outside voting.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("No candidate responses were supplied")]
    NoResponses,

    #[error("Duplicate response id: {id}")]
    DuplicateResponseId { id: String },

    #[error("Evaluation was cancelled")]
    Cancelled,
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// A type alias for results using the top-level `TribunalError`.
pub type Result<T> = std::result::Result<T, TribunalError>;
