//! Property-based tests for the voting engine using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;

use tribunal_core::config::{CriterionConfig, VotingMethod, VotingPolicy};
use tribunal_core::types::JurorEvaluation;
use tribunal_core::voting::{CustomVotingRegistry, VotingContext, VotingEngine, VotingResult};

const BUILTIN: [VotingMethod; 5] = [
    VotingMethod::Majority,
    VotingMethod::Average,
    VotingMethod::Weighted,
    VotingMethod::Ranked,
    VotingMethod::Consensus,
];

/// A randomly shaped jury sitting: candidates, criteria, and juror scores.
#[derive(Debug, Clone)]
struct Sitting {
    context: VotingContext,
    evaluations: Vec<JurorEvaluation>,
}

fn sitting() -> impl Strategy<Value = Sitting> {
    (
        2usize..6,
        1usize..4,
        1usize..6,
        prop::collection::vec(1u32..=10, 3),
        prop::collection::vec(1u32..=10, 3),
        prop::collection::vec(1u32..=5, 5),
        prop::collection::vec(0u32..1000, 5 * 5 * 3),
    )
        .prop_map(
            |(n_candidates, n_criteria, n_jurors, max_scores, weights, juror_weights, raw)| {
                let candidate_ids: Vec<String> =
                    (0..n_candidates).map(|i| format!("r{i}")).collect();
                let criteria: Vec<CriterionConfig> = (0..n_criteria)
                    .map(|c| {
                        CriterionConfig::new(format!("c{c}"), "")
                            .weight(f64::from(weights[c]))
                            .max_score(max_scores[c])
                    })
                    .collect();

                let evaluations = (0..n_jurors)
                    .map(|j| {
                        let scores = candidate_ids
                            .iter()
                            .enumerate()
                            .map(|(r, id)| {
                                let by_criterion = criteria
                                    .iter()
                                    .enumerate()
                                    .map(|(c, criterion)| {
                                        let value = raw[(j * 5 + r) * 3 + c]
                                            % (criterion.max_score + 1);
                                        (criterion.name.clone(), value)
                                    })
                                    .collect();
                                (id.clone(), by_criterion)
                            })
                            .collect();
                        JurorEvaluation {
                            juror_name: format!("j{j}"),
                            juror_weight: f64::from(juror_weights[j]),
                            scores,
                            explanation: Some("generated".into()),
                            explanations: BTreeMap::new(),
                            succeeded: true,
                            error: None,
                            attempts: 1,
                            duration_ms: 0,
                        }
                    })
                    .collect();

                Sitting {
                    context: VotingContext {
                        candidate_ids,
                        criteria,
                        custom_settings: BTreeMap::new(),
                    },
                    evaluations,
                }
            },
        )
}

fn vote(method: VotingMethod, sitting: &Sitting) -> VotingResult {
    VotingEngine::new(
        method,
        None,
        VotingPolicy::default(),
        CustomVotingRegistry::new(),
    )
    .vote(&sitting.evaluations, &sitting.context)
    .expect("at least one juror succeeded")
}

fn position(result: &VotingResult, id: &str) -> usize {
    result
        .ranking
        .iter()
        .position(|r| r == id)
        .expect("ranking covers every candidate")
}

proptest! {
    #[test]
    fn ranking_is_permutation_of_candidates(sitting in sitting()) {
        for method in BUILTIN {
            let result = vote(method, &sitting);
            let mut ranking = result.ranking.clone();
            ranking.sort();
            let mut expected = sitting.context.candidate_ids.clone();
            expected.sort();
            prop_assert_eq!(ranking, expected);
            prop_assert_eq!(&result.ranking[0], &result.winner);
            prop_assert!((0.0..=1.0).contains(&result.confidence));
            prop_assert_eq!(result.scores.len(), sitting.context.candidate_ids.len());
        }
    }

    #[test]
    fn voting_is_deterministic(sitting in sitting()) {
        for method in BUILTIN {
            prop_assert_eq!(vote(method, &sitting), vote(method, &sitting));
        }
    }

    #[test]
    fn raising_a_criterion_weight_never_demotes_its_leader(
        sitting in sitting(),
        criterion_pick in 0usize..3,
        bump in 1u32..=10,
    ) {
        // One juror, so the average ranking is the composite-score ranking.
        let mut single = sitting.clone();
        single.evaluations.truncate(1);
        let criterion = criterion_pick % single.context.criteria.len();
        let name = single.context.criteria[criterion].name.clone();

        let juror = &single.evaluations[0];
        let best = single
            .context
            .candidate_ids
            .iter()
            .filter_map(|id| juror.score(id, &name))
            .max()
            .unwrap_or(0);
        let leader = single
            .context
            .candidate_ids
            .iter()
            .find(|id| juror.score(id, &name) == Some(best))
            .cloned()
            .unwrap_or_default();

        let before = position(&vote(VotingMethod::Average, &single), &leader);
        single.context.criteria[criterion].weight += f64::from(bump);
        let after = position(&vote(VotingMethod::Average, &single), &leader);
        prop_assert!(after <= before, "leader {} fell from {} to {}", leader, before, after);
    }

    #[test]
    fn failed_jurors_do_not_change_the_outcome(sitting in sitting()) {
        let mut with_failure = sitting.clone();
        let mut failed = sitting.evaluations[0].clone();
        failed.juror_name = "absent".into();
        failed.succeeded = false;
        failed.scores.clear();
        with_failure.evaluations.push(failed);
        for method in BUILTIN {
            prop_assert_eq!(vote(method, &sitting), vote(method, &with_failure));
        }
    }
}
