//! Voting engine: deterministic aggregation of juror evaluations.
//!
//! The engine discards failed evaluations, builds the composite matrix, and
//! dispatches to a built-in method or a registered custom function. It is
//! synchronous and side-effect free apart from logging.

pub mod composite;
pub mod custom;
pub mod methods;

pub use composite::{CompositeMatrix, composite_score};
pub use custom::{CustomVoting, CustomVotingFailure, CustomVotingRegistry, VotingContext};

use crate::config::{VotingMethod, VotingPolicy};
use crate::error::VotingError;
use crate::types::JurorEvaluation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The aggregated outcome of one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingResult {
    pub method: VotingMethod,
    /// Every candidate id, most preferred first.
    pub ranking: Vec<String>,
    pub winner: String,
    /// Aggregate score per candidate. Its scale depends on the method.
    pub scores: BTreeMap<String, f64>,
    pub confidence: f64,
    /// Set when the consensus method's agreement threshold was not met.
    #[serde(default)]
    pub low_consensus: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<BTreeMap<String, serde_json::Value>>,
}

impl VotingResult {
    /// Aggregate score gap between first and second place.
    pub fn winner_margin(&self) -> Option<f64> {
        let first = self.scores.get(self.ranking.first()?)?;
        let second = self.scores.get(self.ranking.get(1)?)?;
        Some(first - second)
    }
}

/// The configured voting method plus everything it needs.
#[derive(Debug, Clone)]
pub struct VotingEngine {
    method: VotingMethod,
    custom_function: Option<String>,
    policy: VotingPolicy,
    registry: CustomVotingRegistry,
}

impl VotingEngine {
    pub fn new(
        method: VotingMethod,
        custom_function: Option<String>,
        policy: VotingPolicy,
        registry: CustomVotingRegistry,
    ) -> Self {
        Self {
            method,
            custom_function,
            policy,
            registry,
        }
    }

    pub fn method(&self) -> VotingMethod {
        self.method
    }

    /// Aggregate the successful evaluations into one result.
    ///
    /// Fails with [`VotingError::InsufficientEvaluations`] when no juror succeeded.
    pub fn vote(
        &self,
        evaluations: &[JurorEvaluation],
        context: &VotingContext,
    ) -> Result<VotingResult, VotingError> {
        let successful: Vec<&JurorEvaluation> =
            evaluations.iter().filter(|e| e.succeeded).collect();
        if successful.is_empty() || context.candidate_ids.is_empty() {
            return Err(VotingError::InsufficientEvaluations {
                attempted: evaluations.len(),
            });
        }

        let matrix =
            || CompositeMatrix::build(&successful, &context.candidate_ids, &context.criteria);
        let result = match self.method {
            VotingMethod::Majority => methods::majority(&matrix()),
            VotingMethod::Average => methods::average(&matrix()),
            VotingMethod::Weighted => methods::weighted(&matrix()),
            VotingMethod::Ranked => methods::ranked(&matrix(), &self.policy),
            VotingMethod::Consensus => methods::consensus(&matrix(), &self.policy),
            VotingMethod::Custom => {
                let name = self.custom_function.as_deref().unwrap_or_default();
                let owned: Vec<JurorEvaluation> = successful.iter().map(|e| (*e).clone()).collect();
                custom::run_custom(&self.registry, name, &owned, context)?
            }
        };

        if result.low_consensus {
            warn!(
                winner = result.winner.as_str(),
                agreement = result.confidence,
                threshold = self.policy.consensus_threshold,
                "Low consensus among jurors"
            );
        }
        info!(
            method = %result.method,
            winner = result.winner.as_str(),
            confidence = result.confidence,
            "Voting completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CriterionConfig;
    use crate::error::JurorErrorKind;
    use crate::types::JurorFailure;

    fn context() -> VotingContext {
        VotingContext {
            candidate_ids: vec!["A".into(), "B".into()],
            criteria: vec![CriterionConfig::new("quality", "")],
            custom_settings: BTreeMap::new(),
        }
    }

    fn scored(name: &str, a: u32, b: u32) -> JurorEvaluation {
        JurorEvaluation {
            juror_name: name.into(),
            juror_weight: 1.0,
            scores: [("A", a), ("B", b)]
                .into_iter()
                .map(|(id, s)| (id.to_string(), BTreeMap::from([("quality".to_string(), s)])))
                .collect(),
            explanation: None,
            explanations: BTreeMap::new(),
            succeeded: true,
            error: None,
            attempts: 1,
            duration_ms: 0,
        }
    }

    fn failed(name: &str) -> JurorEvaluation {
        JurorEvaluation {
            juror_name: name.into(),
            juror_weight: 1.0,
            scores: BTreeMap::new(),
            explanation: None,
            explanations: BTreeMap::new(),
            succeeded: false,
            error: Some(JurorFailure {
                kind: JurorErrorKind::Invocation,
                message: "boom".into(),
            }),
            attempts: 4,
            duration_ms: 0,
        }
    }

    fn engine(method: VotingMethod) -> VotingEngine {
        VotingEngine::new(
            method,
            None,
            VotingPolicy::default(),
            CustomVotingRegistry::new(),
        )
    }

    #[test]
    fn test_no_successes_is_insufficient() {
        let err = engine(VotingMethod::Average)
            .vote(&[failed("x"), failed("y")], &context())
            .unwrap_err();
        assert!(matches!(
            err,
            VotingError::InsufficientEvaluations { attempted: 2 }
        ));
    }

    #[test]
    fn test_failed_jurors_do_not_vote() {
        let evaluations = vec![scored("j1", 2, 5), failed("j2"), failed("j3")];
        let result = engine(VotingMethod::Majority)
            .vote(&evaluations, &context())
            .unwrap();
        assert_eq!(result.winner, "B");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_every_builtin_ranks_all_candidates() {
        let evaluations = vec![scored("j1", 5, 3), scored("j2", 4, 2), scored("j3", 1, 5)];
        for method in VotingMethod::ALL {
            if method == VotingMethod::Custom {
                continue;
            }
            let result = engine(method).vote(&evaluations, &context()).unwrap();
            assert_eq!(result.method, method);
            let mut ranking = result.ranking.clone();
            ranking.sort();
            assert_eq!(ranking, vec!["A", "B"]);
            assert_eq!(result.ranking[0], result.winner);
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_custom_receives_only_successes() {
        let mut registry = CustomVotingRegistry::new();
        registry.register(
            "first_juror",
            |evals: &[JurorEvaluation], ctx: &VotingContext| -> Result<VotingResult, CustomVotingFailure> {
                assert!(evals.iter().all(|e| e.succeeded));
                let favourite = if evals[0].total_for("A") >= evals[0].total_for("B") {
                    "A"
                } else {
                    "B"
                };
                let mut ranking = vec![favourite.to_string()];
                ranking.extend(ctx.candidate_ids.iter().filter(|id| *id != favourite).cloned());
                Ok(VotingResult {
                    method: VotingMethod::Custom,
                    winner: favourite.to_string(),
                    scores: ctx.candidate_ids.iter().map(|id| (id.clone(), 1.0)).collect(),
                    ranking,
                    confidence: 0.9,
                    low_consensus: false,
                    custom_data: None,
                })
            },
        );
        let engine = VotingEngine::new(
            VotingMethod::Custom,
            Some("first_juror".into()),
            VotingPolicy::default(),
            registry,
        );
        let result = engine
            .vote(&[failed("x"), scored("j", 1, 4)], &context())
            .unwrap();
        assert_eq!(result.winner, "B");
    }

    #[test]
    fn test_winner_margin() {
        let evaluations = vec![scored("j1", 5, 3)];
        let result = engine(VotingMethod::Average)
            .vote(&evaluations, &context())
            .unwrap();
        assert!((result.winner_margin().unwrap() - 0.4).abs() < 1e-9);
    }
}
