//! Juror invocation.
//!
//! A [`JurorInvoker`] turns one juror, a prompt, and the candidates into a
//! [`RawJudgment`]. The orchestrator runs every raw judgment through
//! [`validate_judgment`], so an invoker never has to police score ranges.

mod llm;
mod parse;
mod prompt;

pub use llm::LlmJuror;
pub use parse::parse_judgment;
pub use prompt::{DEFAULT_JUROR_SYSTEM_PROMPT, build_evaluation_prompt};

use crate::config::{CriterionConfig, JurorConfig};
use crate::error::JurorError;
use crate::types::{ExplanationSheet, ResponseCandidate, ScoreSheet};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// The capability of asking one juror for a judgment.
///
/// Every call must be an independent judgment: the orchestrator retries by
/// calling again.
#[async_trait]
pub trait JurorInvoker: Send + Sync {
    async fn invoke(
        &self,
        juror: &JurorConfig,
        prompt: &str,
        responses: &[ResponseCandidate],
        criteria: &[CriterionConfig],
    ) -> Result<RawJudgment, JurorError>;
}

/// Unvalidated juror output. Score values are kept as JSON so non-numeric
/// answers can be reported as malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawJudgment {
    pub scores: BTreeMap<String, BTreeMap<String, Value>>,
    pub explanations: ExplanationSheet,
    pub explanation: Option<String>,
}

impl RawJudgment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(
        mut self,
        response_id: impl Into<String>,
        criterion: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.scores
            .entry(response_id.into())
            .or_default()
            .insert(criterion.into(), value.into());
        self
    }

    pub fn explain(
        mut self,
        response_id: impl Into<String>,
        criterion: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.explanations
            .entry(response_id.into())
            .or_default()
            .insert(criterion.into(), text.into());
        self
    }

    pub fn with_explanation(mut self, text: impl Into<String>) -> Self {
        self.explanation = Some(text.into());
        self
    }
}

/// A judgment that covers every candidate and criterion with in-range integers.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedJudgment {
    pub scores: ScoreSheet,
    pub explanations: ExplanationSheet,
    pub explanation: Option<String>,
}

/// Check a raw judgment against the candidates and criteria.
///
/// Unknown response ids and criteria are dropped. A missing score, a
/// non-integral or non-numeric value, or a value outside `[0, max_score]`
/// is malformed, as is a missing explanation when one is required.
pub fn validate_judgment(
    raw: RawJudgment,
    responses: &[ResponseCandidate],
    criteria: &[CriterionConfig],
    require_explanation: bool,
) -> Result<ValidatedJudgment, JurorError> {
    let mut scores = ScoreSheet::new();
    for response in responses {
        let given = raw.scores.get(&response.id).ok_or_else(|| {
            JurorError::malformed(format!("missing scores for response '{}'", response.id))
        })?;
        let mut by_criterion = BTreeMap::new();
        for criterion in criteria {
            let value = given.get(&criterion.name).ok_or_else(|| {
                JurorError::malformed(format!(
                    "missing score for response '{}', criterion '{}'",
                    response.id, criterion.name
                ))
            })?;
            let score = coerce_score(value).ok_or_else(|| {
                JurorError::malformed(format!(
                    "non-numeric score {value} for response '{}', criterion '{}'",
                    response.id, criterion.name
                ))
            })?;
            if score < 0 || score > i64::from(criterion.max_score) {
                return Err(JurorError::malformed(format!(
                    "score {score} for response '{}', criterion '{}' is outside [0, {}]",
                    response.id, criterion.name, criterion.max_score
                )));
            }
            by_criterion.insert(criterion.name.clone(), score as u32);
        }
        scores.insert(response.id.clone(), by_criterion);
    }

    let mut explanations = ExplanationSheet::new();
    for response in responses {
        if let Some(notes) = raw.explanations.get(&response.id) {
            let kept: BTreeMap<String, String> = notes
                .iter()
                .filter(|(criterion, text)| {
                    !text.trim().is_empty() && criteria.iter().any(|c| &c.name == *criterion)
                })
                .map(|(c, t)| (c.clone(), t.clone()))
                .collect();
            if !kept.is_empty() {
                explanations.insert(response.id.clone(), kept);
            }
        }
    }

    let explanation = raw
        .explanation
        .filter(|text| !text.trim().is_empty())
        .or_else(|| summarize_explanations(&explanations));
    if require_explanation && explanation.is_none() {
        return Err(JurorError::malformed("explanation is required but missing"));
    }

    Ok(ValidatedJudgment {
        scores,
        explanations,
        explanation,
    })
}

/// Accept integers, integral floats, and integer strings.
fn coerce_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn summarize_explanations(explanations: &ExplanationSheet) -> Option<String> {
    let lines: Vec<String> = explanations
        .iter()
        .flat_map(|(response, notes)| {
            notes
                .iter()
                .map(move |(criterion, text)| format!("[{response}] {criterion}: {text}"))
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
