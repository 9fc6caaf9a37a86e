//! Built-in voting methods.
//!
//! Each method is a pure function of a [`CompositeMatrix`] and returns a
//! complete [`VotingResult`]. Ties always resolve to the earliest candidate.

use super::VotingResult;
use super::composite::{CompositeMatrix, rank_indices};
use crate::config::{VotingMethod, VotingPolicy};
use serde_json::json;
use std::collections::BTreeMap;

/// Largest population standard deviation of values confined to `[0, 1]`.
pub const MAX_SPREAD: f64 = 0.5;

/// One vote per juror for its top composite; confidence is the winner's vote share.
pub fn majority(matrix: &CompositeMatrix) -> VotingResult {
    let votes = vote_counts(matrix);
    let tallies: Vec<f64> = votes.iter().map(|&v| v as f64).collect();
    let ranking = rank_indices(&tallies);
    let winner = ranking[0];
    let confidence = votes[winner] as f64 / matrix.rows.len() as f64;

    let mut custom_data = BTreeMap::new();
    custom_data.insert("total_votes".to_string(), json!(matrix.rows.len()));
    build(
        VotingMethod::Majority,
        matrix,
        &tallies,
        &ranking,
        confidence,
        Some(custom_data),
    )
}

/// Unweighted mean composite; confidence falls with the spread of the winner's composites.
pub fn average(matrix: &CompositeMatrix) -> VotingResult {
    let weights = vec![1.0; matrix.rows.len()];
    spread_scored(VotingMethod::Average, matrix, &weights)
}

/// Juror-weighted mean composite with a juror-weighted spread.
pub fn weighted(matrix: &CompositeMatrix) -> VotingResult {
    let weights: Vec<f64> = matrix.rows.iter().map(|row| row.juror_weight).collect();
    spread_scored(VotingMethod::Weighted, matrix, &weights)
}

/// Borda count: the k-th of N preferences earns N - k points.
///
/// Confidence is the gap between the top two point totals divided by the
/// largest possible total, `(N - 1) * sum(juror weights)`.
pub fn ranked(matrix: &CompositeMatrix, policy: &VotingPolicy) -> VotingResult {
    let n = matrix.candidates.len();
    let mut points = vec![0.0; n];
    let mut weight_sum = 0.0;
    for row in &matrix.rows {
        let weight = if policy.ranked_juror_weighted {
            row.juror_weight
        } else {
            1.0
        };
        weight_sum += weight;
        for (position, &candidate) in rank_indices(&row.scores).iter().enumerate() {
            points[candidate] += (n - 1 - position) as f64 * weight;
        }
    }

    let ranking = rank_indices(&points);
    let max_points = (n.saturating_sub(1)) as f64 * weight_sum;
    let confidence = if n < 2 || max_points <= 0.0 {
        1.0
    } else {
        (points[ranking[0]] - points[ranking[1]]) / max_points
    };

    let mut custom_data = BTreeMap::new();
    custom_data.insert(
        "juror_weighted".to_string(),
        json!(policy.ranked_juror_weighted),
    );
    custom_data.insert("max_points".to_string(), json!(max_points));
    build(
        VotingMethod::Ranked,
        matrix,
        &points,
        &ranking,
        confidence,
        Some(custom_data),
    )
}

/// Majority winner plus an agreement check. An agreement at or below the
/// threshold is reported as low consensus; the winner is still returned.
pub fn consensus(matrix: &CompositeMatrix, policy: &VotingPolicy) -> VotingResult {
    let mut result = majority(matrix);
    let agreement = result.confidence;
    let low = agreement <= policy.consensus_threshold;

    let mut custom_data = result.custom_data.take().unwrap_or_default();
    custom_data.insert("low_consensus".to_string(), json!(low));
    custom_data.insert("agreement".to_string(), json!(agreement));
    custom_data.insert(
        "threshold".to_string(),
        json!(policy.consensus_threshold),
    );

    result.method = VotingMethod::Consensus;
    result.low_consensus = low;
    result.custom_data = Some(custom_data);
    result
}

/// Votes each candidate received, aligned with `matrix.candidates`.
pub fn vote_counts(matrix: &CompositeMatrix) -> Vec<usize> {
    let mut votes = vec![0usize; matrix.candidates.len()];
    for row in &matrix.rows {
        votes[row.top_choice()] += 1;
    }
    votes
}

fn spread_scored(method: VotingMethod, matrix: &CompositeMatrix, weights: &[f64]) -> VotingResult {
    let total_weight: f64 = weights.iter().sum();
    let means: Vec<f64> = (0..matrix.candidates.len())
        .map(|candidate| weighted_mean(&matrix.column(candidate), weights, total_weight))
        .collect();
    let ranking = rank_indices(&means);
    let winner = ranking[0];

    let column = matrix.column(winner);
    let variance = column
        .iter()
        .zip(weights)
        .map(|(value, weight)| weight * (value - means[winner]).powi(2))
        .sum::<f64>()
        / total_weight;
    let std_dev = variance.sqrt();
    let confidence = 1.0 - std_dev / MAX_SPREAD;

    let mut custom_data = BTreeMap::new();
    custom_data.insert("winner_std_dev".to_string(), json!(std_dev));
    if method == VotingMethod::Weighted {
        custom_data.insert("total_juror_weight".to_string(), json!(total_weight));
    }
    build(method, matrix, &means, &ranking, confidence, Some(custom_data))
}

fn weighted_mean(values: &[f64], weights: &[f64], total_weight: f64) -> f64 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total_weight
}

fn build(
    method: VotingMethod,
    matrix: &CompositeMatrix,
    aggregate: &[f64],
    ranking: &[usize],
    confidence: f64,
    custom_data: Option<BTreeMap<String, serde_json::Value>>,
) -> VotingResult {
    let ids: Vec<String> = ranking
        .iter()
        .map(|&i| matrix.candidates[i].clone())
        .collect();
    VotingResult {
        method,
        winner: ids[0].clone(),
        ranking: ids,
        scores: matrix
            .candidates
            .iter()
            .cloned()
            .zip(aggregate.iter().copied())
            .collect(),
        confidence: confidence.clamp(0.0, 1.0),
        low_consensus: false,
        custom_data,
    }
}
