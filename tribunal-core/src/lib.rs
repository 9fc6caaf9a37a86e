//! # Tribunal Core
//!
//! Core library for Tribunal, an LLM jury for judging candidate responses.
//! Provides criterion and juror configuration, the juror invocation adapter,
//! the concurrent evaluation orchestrator, the voting engine and the verdict
//! synthesizer, tied together by [`Jury`].

pub mod brain;
pub mod config;
pub mod error;
pub mod juror;
pub mod jury;
pub mod orchestrator;
pub mod providers;
pub mod types;
pub mod verdict;
pub mod voting;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use config::{
    CriterionConfig, ExecutionConfig, JurorConfig, JuryConfig, LlmConfig, TribunalConfig,
    VotingMethod, VotingPolicy, load_config, load_jury_config,
};
pub use error::{
    ConfigError, EvaluationError, JurorError, JurorErrorKind, LlmError, Result, TribunalError,
    VotingError,
};
pub use juror::{JurorInvoker, LlmJuror, RawJudgment};
pub use jury::{Jury, JurySummary};
pub use orchestrator::{EvaluationOrchestrator, OrchestratorSettings};
pub use types::{JurorEvaluation, JurorFailure, ResponseCandidate};
pub use verdict::{Verdict, VerdictSummary};
pub use voting::{
    CustomVoting, CustomVotingFailure, CustomVotingRegistry, VotingContext, VotingEngine,
    VotingResult,
};
