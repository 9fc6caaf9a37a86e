//! Evaluation orchestrator: one concurrent task per juror, sequential retries
//! within each task, and a fan-in that keeps the configured juror order.
//!
//! A juror that exhausts its attempts produces a failed [`JurorEvaluation`]
//! instead of an error, so one bad juror never aborts the others.

use crate::config::{CriterionConfig, ExecutionConfig, JurorConfig, JuryConfig};
use crate::error::{EvaluationError, JurorError};
use crate::juror::{JurorInvoker, ValidatedJudgment, validate_judgment};
use crate::types::{JurorEvaluation, JurorFailure, ResponseCandidate};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Retry, timeout and fan-out settings for one orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Additional attempts after the first one fails.
    pub max_retries: u32,
    pub require_explanation: bool,
    pub execution: ExecutionConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            require_explanation: true,
            execution: ExecutionConfig::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &JuryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            require_explanation: config.require_explanation,
            execution: config.execution.clone(),
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Fans out juror invocations and collects one evaluation per juror.
pub struct EvaluationOrchestrator {
    invoker: Arc<dyn JurorInvoker>,
    settings: OrchestratorSettings,
}

impl EvaluationOrchestrator {
    pub fn new(invoker: Arc<dyn JurorInvoker>, settings: OrchestratorSettings) -> Self {
        Self { invoker, settings }
    }

    pub fn from_config(invoker: Arc<dyn JurorInvoker>, config: &JuryConfig) -> Self {
        Self::new(invoker, OrchestratorSettings::from_config(config))
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Evaluate the candidates with every juror.
    ///
    /// Returns once every juror has succeeded or run out of attempts. The
    /// result is in `jurors` order, whatever order the tasks finished in.
    pub async fn run(
        &self,
        prompt: &str,
        responses: &[ResponseCandidate],
        jurors: &[JurorConfig],
        criteria: &[CriterionConfig],
    ) -> Vec<JurorEvaluation> {
        let concurrency = self.settings.execution.max_concurrency.max(1);
        info!(
            jurors = jurors.len(),
            responses = responses.len(),
            concurrency,
            "Dispatching jurors"
        );

        let evaluations: Vec<JurorEvaluation> = futures::stream::iter(
            jurors
                .iter()
                .map(|juror| self.evaluate_juror(juror, prompt, responses, criteria)),
        )
        .buffered(concurrency)
        .collect()
        .await;

        let succeeded = evaluations.iter().filter(|e| e.succeeded).count();
        if succeeded < evaluations.len() {
            warn!(
                succeeded,
                total = evaluations.len(),
                "{}/{} jurors succeeded",
                succeeded,
                evaluations.len()
            );
        }
        evaluations
    }

    /// Like [`run`](Self::run), but stops every in-flight juror as soon as
    /// `token` is cancelled and returns [`EvaluationError::Cancelled`].
    pub async fn run_with_cancellation(
        &self,
        prompt: &str,
        responses: &[ResponseCandidate],
        jurors: &[JurorConfig],
        criteria: &[CriterionConfig],
        token: &CancellationToken,
    ) -> Result<Vec<JurorEvaluation>, EvaluationError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!("Evaluation cancelled, dropping in-flight jurors");
                Err(EvaluationError::Cancelled)
            }
            evaluations = self.run(prompt, responses, jurors, criteria) => Ok(evaluations),
        }
    }

    async fn evaluate_juror(
        &self,
        juror: &JurorConfig,
        prompt: &str,
        responses: &[ResponseCandidate],
        criteria: &[CriterionConfig],
    ) -> JurorEvaluation {
        let start = Instant::now();
        let max_attempts = self.settings.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(juror = juror.name.as_str(), attempt, max_attempts, "Invoking juror");

            match self.attempt(juror, prompt, responses, criteria).await {
                Ok(judgment) => {
                    debug!(juror = juror.name.as_str(), attempt, "Juror evaluation accepted");
                    return JurorEvaluation {
                        juror_name: juror.name.clone(),
                        juror_weight: juror.weight,
                        scores: judgment.scores,
                        explanation: judgment.explanation,
                        explanations: judgment.explanations,
                        succeeded: true,
                        error: None,
                        attempts: attempt,
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                }
                Err(e) if attempt < max_attempts => {
                    let backoff = self.settings.execution.backoff_for(attempt);
                    warn!(
                        juror = juror.name.as_str(),
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Juror attempt failed, retrying"
                    );
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) => {
                    error!(
                        juror = juror.name.as_str(),
                        attempts = attempt,
                        error = %e,
                        "Juror exhausted all attempts"
                    );
                    return JurorEvaluation {
                        juror_name: juror.name.clone(),
                        juror_weight: juror.weight,
                        scores: Default::default(),
                        explanation: None,
                        explanations: Default::default(),
                        succeeded: false,
                        error: Some(JurorFailure::from(&e)),
                        attempts: attempt,
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                }
            }
        }
    }

    /// One bounded invocation followed by validation.
    async fn attempt(
        &self,
        juror: &JurorConfig,
        prompt: &str,
        responses: &[ResponseCandidate],
        criteria: &[CriterionConfig],
    ) -> Result<ValidatedJudgment, JurorError> {
        let call = self.invoker.invoke(juror, prompt, responses, criteria);
        let raw = match self.settings.execution.attempt_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| JurorError::Timeout {
                    timeout_secs: limit.as_secs(),
                })??,
            None => call.await?,
        };
        validate_judgment(raw, responses, criteria, self.settings.require_explanation)
    }
}
