//! Caller-supplied voting functions and the contract their results must meet.

use super::VotingResult;
use crate::config::{CriterionConfig, VotingMethod};
use crate::error::VotingError;
use crate::types::JurorEvaluation;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Error type custom functions may return.
pub type CustomVotingFailure = Box<dyn std::error::Error + Send + Sync>;

/// What a custom function can see besides the evaluations.
#[derive(Debug, Clone, Default)]
pub struct VotingContext {
    /// Candidate ids in supplied order.
    pub candidate_ids: Vec<String>,
    pub criteria: Vec<CriterionConfig>,
    pub custom_settings: BTreeMap<String, serde_json::Value>,
}

impl VotingContext {
    /// Position of a candidate in supplied order, used for tie-breaks.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.candidate_ids.iter().position(|c| c == id)
    }

    pub fn setting_f64(&self, key: &str) -> Option<f64> {
        self.custom_settings.get(key).and_then(|v| v.as_f64())
    }
}

/// A custom aggregation. Receives only successful evaluations, in juror order.
pub trait CustomVoting: Send + Sync {
    fn vote(
        &self,
        evaluations: &[JurorEvaluation],
        context: &VotingContext,
    ) -> Result<VotingResult, CustomVotingFailure>;
}

impl<F> CustomVoting for F
where
    F: Fn(&[JurorEvaluation], &VotingContext) -> Result<VotingResult, CustomVotingFailure>
        + Send
        + Sync,
{
    fn vote(
        &self,
        evaluations: &[JurorEvaluation],
        context: &VotingContext,
    ) -> Result<VotingResult, CustomVotingFailure> {
        self(evaluations, context)
    }
}

/// Named custom voting functions.
#[derive(Clone, Default)]
pub struct CustomVotingRegistry {
    functions: BTreeMap<String, Arc<dyn CustomVoting>>,
}

impl CustomVotingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, function: impl CustomVoting + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomVoting>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for CustomVotingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomVotingRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Run a registered function and check its result against the contract.
pub fn run_custom(
    registry: &CustomVotingRegistry,
    name: &str,
    evaluations: &[JurorEvaluation],
    context: &VotingContext,
) -> Result<VotingResult, VotingError> {
    let function = registry
        .get(name)
        .ok_or_else(|| VotingError::UnknownCustomFunction {
            name: name.to_string(),
        })?;
    let result = function
        .vote(evaluations, context)
        .map_err(|e| VotingError::CustomFunctionFailed {
            function: name.to_string(),
            message: e.to_string(),
        })?;
    validate_contract(name, &result, context)?;
    Ok(result)
}

/// Reject a result unless it ranks exactly the candidates, names the top
/// of its ranking as winner, scores every candidate, and keeps confidence
/// within `[0, 1]`.
pub fn validate_contract(
    function: &str,
    result: &VotingResult,
    context: &VotingContext,
) -> Result<(), VotingError> {
    let violation = |reason: String| VotingError::CustomContractViolation {
        function: function.to_string(),
        reason,
    };

    if result.method != VotingMethod::Custom {
        return Err(violation(format!(
            "method must be 'custom', got '{}'",
            result.method
        )));
    }

    let expected: HashSet<&str> = context.candidate_ids.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for id in &result.ranking {
        if !expected.contains(id.as_str()) {
            return Err(violation(format!("ranking contains unknown response '{id}'")));
        }
        if !seen.insert(id.as_str()) {
            return Err(violation(format!("ranking lists response '{id}' twice")));
        }
    }
    if let Some(missing) = context
        .candidate_ids
        .iter()
        .find(|id| !seen.contains(id.as_str()))
    {
        return Err(violation(format!("ranking is missing response '{missing}'")));
    }

    if result.ranking.first() != Some(&result.winner) {
        return Err(violation(format!(
            "winner '{}' is not first in the ranking",
            result.winner
        )));
    }

    if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return Err(violation(format!(
            "confidence {} is outside [0, 1]",
            result.confidence
        )));
    }

    for id in result.scores.keys() {
        if !expected.contains(id.as_str()) {
            return Err(violation(format!("scores contain unknown response '{id}'")));
        }
    }
    if let Some(missing) = context
        .candidate_ids
        .iter()
        .find(|id| !result.scores.contains_key(id.as_str()))
    {
        return Err(violation(format!("scores are missing response '{missing}'")));
    }
    if let Some((id, _)) = result.scores.iter().find(|(_, s)| !s.is_finite()) {
        return Err(violation(format!("score for '{id}' is not finite")));
    }
    Ok(())
}
