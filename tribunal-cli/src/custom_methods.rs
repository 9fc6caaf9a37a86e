//! Named custom voting functions shipped with the `tribunal` binary.
//!
//! Select one with `voting_method = "custom"` and
//! `custom_voting_function = "<name>"` in the jury configuration.
//! Both work on composite scores, so criterion scales do not matter.

use serde_json::json;
use std::collections::BTreeMap;
use tribunal_core::config::VotingMethod;
use tribunal_core::types::JurorEvaluation;
use tribunal_core::voting::composite::{composite_score, rank_indices};
use tribunal_core::voting::{CustomVotingFailure, CustomVotingRegistry, VotingContext, VotingResult};

pub const MARGIN_OF_VICTORY: &str = "margin_of_victory";
pub const UNANIMOUS_PRIORITY: &str = "unanimous_priority";

/// Registry with every built-in custom function.
pub fn registry() -> CustomVotingRegistry {
    let mut registry = CustomVotingRegistry::new();
    registry.register(MARGIN_OF_VICTORY, margin_of_victory);
    registry.register(UNANIMOUS_PRIORITY, unanimous_priority);
    registry
}

/// Juror-weighted mean composite per candidate, in candidate order.
fn weighted_means(evaluations: &[JurorEvaluation], context: &VotingContext) -> Vec<f64> {
    let total_weight: f64 = evaluations.iter().map(|e| e.juror_weight).sum();
    context
        .candidate_ids
        .iter()
        .map(|id| {
            let sum: f64 = evaluations
                .iter()
                .map(|e| e.juror_weight * composite_score(e, id, &context.criteria))
                .sum();
            if total_weight > 0.0 { sum / total_weight } else { 0.0 }
        })
        .collect()
}

fn result(
    context: &VotingContext,
    means: &[f64],
    confidence: f64,
    custom_data: BTreeMap<String, serde_json::Value>,
) -> VotingResult {
    let ranking: Vec<String> = rank_indices(means)
        .into_iter()
        .map(|i| context.candidate_ids[i].clone())
        .collect();
    VotingResult {
        method: VotingMethod::Custom,
        winner: ranking.first().cloned().unwrap_or_default(),
        ranking,
        scores: context
            .candidate_ids
            .iter()
            .cloned()
            .zip(means.iter().copied())
            .collect(),
        confidence: confidence.clamp(0.0, 1.0),
        low_consensus: false,
        custom_data: Some(custom_data),
    }
}

/// Confidence grows with the gap between first and second place.
///
/// `confidence = min(0.5 + margin, cap)`, where `cap` comes from the
/// `confidence_cap` setting (default 0.95). A lone candidate gets 0.5.
pub fn margin_of_victory(
    evaluations: &[JurorEvaluation],
    context: &VotingContext,
) -> Result<VotingResult, CustomVotingFailure> {
    let cap = context.setting_f64("confidence_cap").unwrap_or(0.95);
    let means = weighted_means(evaluations, context);
    let order = rank_indices(&means);
    let margin = match (order.first(), order.get(1)) {
        (Some(&first), Some(&second)) => means[first] - means[second],
        _ => 0.0,
    };
    let confidence = if order.len() < 2 {
        0.5
    } else {
        (0.5 + margin).min(cap)
    };

    let custom_data = BTreeMap::from([
        ("margin".to_string(), json!(margin)),
        ("method_name".to_string(), json!(MARGIN_OF_VICTORY)),
    ]);
    Ok(result(context, &means, confidence, custom_data))
}

/// Rewards winners every juror approves of.
///
/// A juror approves a candidate whose composite reaches the
/// `approval_threshold` setting (default 0.6). A winner approved by every
/// juror gets 0.95 confidence; otherwise its mean composite, capped at 0.85.
pub fn unanimous_priority(
    evaluations: &[JurorEvaluation],
    context: &VotingContext,
) -> Result<VotingResult, CustomVotingFailure> {
    let threshold = context.setting_f64("approval_threshold").unwrap_or(0.6);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("approval_threshold {threshold} is outside [0, 1]").into());
    }

    let means = weighted_means(evaluations, context);
    let approvals: Vec<usize> = context
        .candidate_ids
        .iter()
        .map(|id| {
            evaluations
                .iter()
                .filter(|e| composite_score(e, id, &context.criteria) >= threshold)
                .count()
        })
        .collect();

    let best = rank_indices(&means).first().copied().unwrap_or(0);
    let unanimous = !evaluations.is_empty() && approvals[best] == evaluations.len();
    let confidence = if unanimous { 0.95 } else { means[best].min(0.85) };

    let votes: BTreeMap<&str, usize> = context
        .candidate_ids
        .iter()
        .map(String::as_str)
        .zip(approvals.iter().copied())
        .collect();
    let custom_data = BTreeMap::from([
        ("unanimous".to_string(), json!(unanimous)),
        ("approvals".to_string(), json!(votes)),
        ("method_name".to_string(), json!(UNANIMOUS_PRIORITY)),
    ]);
    Ok(result(context, &means, confidence, custom_data))
}
