//! Verdict synthesis.
//!
//! Packages the voting result together with the evidence it was derived
//! from. Nothing here changes the outcome: the summary and breakdowns are
//! views over data already produced by the orchestrator and the engine.

use crate::config::{CriterionConfig, JuryConfig, VotingMethod};
use crate::types::{JurorEvaluation, ResponseCandidate};
use crate::voting::VotingResult;
use crate::voting::composite::TIE_EPSILON;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The final output of one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub jury_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jury_description: Option<String>,
    pub prompt: String,
    pub responses: Vec<ResponseCandidate>,
    pub criteria: Vec<CriterionConfig>,
    pub final_verdict: VotingResult,
    /// One entry per configured juror, in configuration order.
    pub juror_evaluations: Vec<JurorEvaluation>,
    pub summary: VerdictSummary,
    pub created_at: DateTime<Utc>,
}

/// Headline numbers for a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub total_jurors: usize,
    pub successful_jurors: usize,
    pub failed_jurors: usize,
    pub total_responses: usize,
    pub total_criteria: usize,
    pub voting_method: VotingMethod,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_margin: Option<f64>,
    /// Confidence is at its maximum.
    pub unanimous: bool,
    pub low_consensus: bool,
}

/// One juror's raw scores for one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBreakdown {
    pub response_id: String,
    pub scores: BTreeMap<String, u32>,
    pub total_score: u64,
    pub average_score: f64,
}

/// One juror's scores across all responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurorBreakdown {
    pub juror_name: String,
    pub juror_weight: f64,
    pub succeeded: bool,
    pub responses: Vec<ResponseBreakdown>,
}

/// Assemble a verdict from the jury's configuration, the candidates, the
/// orchestrator's evaluations, and the voting result.
pub fn synthesize(
    config: &JuryConfig,
    prompt: &str,
    responses: Vec<ResponseCandidate>,
    juror_evaluations: Vec<JurorEvaluation>,
    final_verdict: VotingResult,
) -> Verdict {
    let successful_jurors = juror_evaluations.iter().filter(|e| e.succeeded).count();
    let summary = VerdictSummary {
        total_jurors: juror_evaluations.len(),
        successful_jurors,
        failed_jurors: juror_evaluations.len() - successful_jurors,
        total_responses: responses.len(),
        total_criteria: config.criteria.len(),
        voting_method: final_verdict.method,
        confidence: final_verdict.confidence,
        winner_margin: final_verdict.winner_margin(),
        unanimous: final_verdict.confidence >= 1.0 - TIE_EPSILON,
        low_consensus: final_verdict.low_consensus,
    };

    Verdict {
        jury_name: config.name.clone(),
        jury_description: config.description.clone(),
        prompt: prompt.to_string(),
        responses,
        criteria: config.criteria.clone(),
        final_verdict,
        juror_evaluations,
        summary,
        created_at: Utc::now(),
    }
}

impl Verdict {
    pub fn winner(&self) -> &str {
        &self.final_verdict.winner
    }

    pub fn response(&self, id: &str) -> Option<&ResponseCandidate> {
        self.responses.iter().find(|r| r.id == id)
    }

    pub fn successful_evaluations(&self) -> impl Iterator<Item = &JurorEvaluation> {
        self.juror_evaluations.iter().filter(|e| e.succeeded)
    }

    /// Per-juror, per-response score breakdowns. Failed jurors appear with no responses.
    pub fn juror_breakdowns(&self) -> Vec<JurorBreakdown> {
        self.juror_evaluations
            .iter()
            .map(|evaluation| JurorBreakdown {
                juror_name: evaluation.juror_name.clone(),
                juror_weight: evaluation.juror_weight,
                succeeded: evaluation.succeeded,
                responses: self
                    .responses
                    .iter()
                    .filter_map(|r| evaluation.scores.get(&r.id).map(|s| (r, s)))
                    .map(|(response, scores)| {
                        let total_score: u64 = scores.values().copied().map(u64::from).sum();
                        let average_score = if scores.is_empty() {
                            0.0
                        } else {
                            total_score as f64 / scores.len() as f64
                        };
                        ResponseBreakdown {
                            response_id: response.id.clone(),
                            scores: scores.clone(),
                            total_score,
                            average_score,
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    /// Human-readable report.
    pub fn render_text(&self) -> String {
        let result = &self.final_verdict;
        let summary = &self.summary;
        let mut out = String::new();

        out.push_str(&format!("Jury: {}\n", self.jury_name));
        if let Some(description) = &self.jury_description {
            out.push_str(&format!("{description}\n"));
        }
        let winner = self
            .response(&result.winner)
            .map(ResponseCandidate::display_name)
            .unwrap_or(&result.winner);
        out.push_str(&format!("\nWinner: {winner}\n"));
        out.push_str(&format!("Method: {}\n", summary.voting_method));
        out.push_str(&format!("Confidence: {:.1}%\n", summary.confidence * 100.0));
        if let Some(margin) = summary.winner_margin {
            out.push_str(&format!("Margin: {margin:.3}\n"));
        }
        if summary.low_consensus {
            out.push_str("Warning: low consensus among jurors\n");
        }
        out.push_str(&format!(
            "Jurors: {}/{} succeeded\n",
            summary.successful_jurors, summary.total_jurors
        ));

        out.push_str("\nRanking:\n");
        for (position, id) in result.ranking.iter().enumerate() {
            let name = self.response(id).map(ResponseCandidate::display_name).unwrap_or(id);
            let score = result.scores.get(id).copied().unwrap_or_default();
            out.push_str(&format!("  {}. {name} ({score:.3})\n", position + 1));
        }

        out.push_str("\nJurors:\n");
        for evaluation in &self.juror_evaluations {
            match &evaluation.error {
                None => out.push_str(&format!(
                    "  {} (weight {}, {} attempt(s))\n",
                    evaluation.juror_name, evaluation.juror_weight, evaluation.attempts
                )),
                Some(failure) => out.push_str(&format!(
                    "  {} FAILED after {} attempt(s) [{}]: {}\n",
                    evaluation.juror_name, evaluation.attempts, failure.kind, failure.message
                )),
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}
