//! The `Jury` façade: one validated configuration, one juror invoker, one
//! voting engine. `evaluate` runs the whole pipeline.

use crate::config::{CriterionConfig, JuryConfig, VotingMethod};
use crate::error::{ConfigError, EvaluationError, Result};
use crate::juror::JurorInvoker;
use crate::orchestrator::EvaluationOrchestrator;
use crate::types::{JurorEvaluation, ResponseCandidate};
use crate::verdict::{Verdict, synthesize};
use crate::voting::{CustomVotingRegistry, VotingContext, VotingEngine};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A configured panel of jurors.
pub struct Jury {
    config: JuryConfig,
    orchestrator: EvaluationOrchestrator,
    engine: VotingEngine,
}

/// Overview of a jury's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurySummary {
    pub name: String,
    pub description: Option<String>,
    pub voting_method: VotingMethod,
    pub num_jurors: usize,
    pub num_criteria: usize,
    pub jurors: Vec<JurorSummary>,
    pub criteria: Vec<CriterionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurorSummary {
    pub name: String,
    pub model: String,
    pub weight: f64,
}

impl std::fmt::Debug for Jury {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jury")
            .field("name", &self.config.name)
            .field("jurors", &self.config.jurors.len())
            .field("voting_method", &self.config.voting_method)
            .finish()
    }
}

impl Jury {
    /// Validate `config` and build the jury.
    ///
    /// Every configuration error surfaces here, before any juror can be invoked.
    pub fn new(
        config: JuryConfig,
        invoker: Arc<dyn JurorInvoker>,
        registry: CustomVotingRegistry,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate(&registry)?;

        let orchestrator = EvaluationOrchestrator::from_config(invoker, &config);
        let engine = VotingEngine::new(
            config.voting_method,
            config.custom_voting_function.clone(),
            config.voting.clone(),
            registry,
        );
        info!(
            jury = config.name.as_str(),
            jurors = config.jurors.len(),
            criteria = config.criteria.len(),
            method = %config.voting_method,
            "Jury initialized"
        );

        Ok(Self {
            config,
            orchestrator,
            engine,
        })
    }

    pub fn config(&self) -> &JuryConfig {
        &self.config
    }

    /// Evaluate `responses` against `prompt` and return the verdict.
    pub async fn evaluate(
        &self,
        prompt: &str,
        responses: Vec<ResponseCandidate>,
    ) -> Result<Verdict> {
        self.check_responses(&responses)?;
        let evaluations = self
            .orchestrator
            .run(prompt, &responses, &self.config.jurors, &self.config.criteria)
            .await;
        self.conclude(prompt, responses, evaluations)
    }

    /// Evaluate plain texts, giving each a generated id.
    pub async fn evaluate_texts<S: Into<String>>(
        &self,
        prompt: &str,
        texts: impl IntoIterator<Item = S>,
    ) -> Result<Verdict> {
        let responses = texts.into_iter().map(ResponseCandidate::new).collect();
        self.evaluate(prompt, responses).await
    }

    /// Like [`evaluate`](Self::evaluate), but abandons every in-flight juror
    /// and fails with [`EvaluationError::Cancelled`] once `token` is cancelled.
    pub async fn evaluate_with_cancellation(
        &self,
        prompt: &str,
        responses: Vec<ResponseCandidate>,
        token: &CancellationToken,
    ) -> Result<Verdict> {
        self.check_responses(&responses)?;
        let evaluations = self
            .orchestrator
            .run_with_cancellation(
                prompt,
                &responses,
                &self.config.jurors,
                &self.config.criteria,
                token,
            )
            .await?;
        self.conclude(prompt, responses, evaluations)
    }

    pub fn summary(&self) -> JurySummary {
        JurySummary {
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            voting_method: self.config.voting_method,
            num_jurors: self.config.jurors.len(),
            num_criteria: self.config.criteria.len(),
            jurors: self
                .config
                .jurors
                .iter()
                .map(|j| JurorSummary {
                    name: j.name.clone(),
                    model: j.model_name.clone(),
                    weight: j.weight,
                })
                .collect(),
            criteria: self.config.criteria.clone(),
        }
    }

    fn check_responses(&self, responses: &[ResponseCandidate]) -> Result<()> {
        if responses.is_empty() {
            return Err(EvaluationError::NoResponses.into());
        }
        let mut seen = HashSet::new();
        for response in responses {
            if !seen.insert(response.id.as_str()) {
                return Err(EvaluationError::DuplicateResponseId {
                    id: response.id.clone(),
                }
                .into());
            }
        }
        if responses.len() == 1 {
            warn!("Only one response provided, comparison will be limited");
        }
        Ok(())
    }

    fn conclude(
        &self,
        prompt: &str,
        responses: Vec<ResponseCandidate>,
        evaluations: Vec<JurorEvaluation>,
    ) -> Result<Verdict> {
        let context = VotingContext {
            candidate_ids: responses.iter().map(|r| r.id.clone()).collect(),
            criteria: self.config.criteria.clone(),
            custom_settings: self.config.custom_settings.clone(),
        };
        let result = self.engine.vote(&evaluations, &context)?;
        Ok(synthesize(
            &self.config,
            prompt,
            responses,
            evaluations,
            result,
        ))
    }
}
