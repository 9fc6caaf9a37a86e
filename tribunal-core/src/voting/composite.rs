//! Composite scores: each juror's per-criterion scores for a response,
//! normalized by `max_score`, weighted by criterion weight, and divided by
//! the total criterion weight. Every composite lies in `[0, 1]`.

use crate::config::CriterionConfig;
use crate::types::JurorEvaluation;
use std::cmp::Reverse;

/// Scores closer than this are treated as tied.
pub const TIE_EPSILON: f64 = 1e-9;

/// Composite score of one juror for one response.
///
/// A missing score counts as zero; succeeded evaluations never have one.
pub fn composite_score(
    evaluation: &JurorEvaluation,
    response_id: &str,
    criteria: &[CriterionConfig],
) -> f64 {
    let total_weight: f64 = criteria.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = criteria
        .iter()
        .map(|c| {
            let score = evaluation.score(response_id, &c.name).unwrap_or(0);
            (f64::from(score) / f64::from(c.max_score.max(1))) * c.weight
        })
        .sum();
    weighted / total_weight
}

/// One juror's composites, aligned with [`CompositeMatrix::candidates`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRow {
    pub juror_name: String,
    pub juror_weight: f64,
    pub scores: Vec<f64>,
}

impl CompositeRow {
    /// Index of the preferred response; the earliest candidate wins ties.
    pub fn top_choice(&self) -> usize {
        rank_indices(&self.scores).first().copied().unwrap_or(0)
    }
}

/// Composites for every (successful juror, candidate) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeMatrix {
    pub candidates: Vec<String>,
    pub rows: Vec<CompositeRow>,
}

impl CompositeMatrix {
    pub fn build(
        evaluations: &[&JurorEvaluation],
        candidates: &[String],
        criteria: &[CriterionConfig],
    ) -> Self {
        let rows = evaluations
            .iter()
            .map(|eval| CompositeRow {
                juror_name: eval.juror_name.clone(),
                juror_weight: eval.juror_weight,
                scores: candidates
                    .iter()
                    .map(|id| composite_score(eval, id, criteria))
                    .collect(),
            })
            .collect();
        Self {
            candidates: candidates.to_vec(),
            rows,
        }
    }

    /// All composites one candidate received, in juror order.
    pub fn column(&self, candidate: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row.scores[candidate]).collect()
    }

    pub fn total_juror_weight(&self) -> f64 {
        self.rows.iter().map(|row| row.juror_weight).sum()
    }
}

/// Scores snapped to a `TIE_EPSILON` grid; equal keys are ties.
pub fn tie_key(score: f64) -> i64 {
    (score / TIE_EPSILON).round() as i64
}

/// Indices ordered by descending score. Ties keep the lower index first.
pub fn rank_indices(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| (Reverse(tie_key(scores[i])), i));
    order
}
