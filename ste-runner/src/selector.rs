// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordering scored tests and admitting them under budgets.
//!
//! [`select_tests`] is the entry point for the whole pipeline: it resolves affected tests,
//! scores every known test, then walks them in priority order:
//!
//! 1. Affected tests come before unaffected ones. Within each group, higher scores come first,
//!    and equal scores are ordered by test ID.
//! 2. Once the test-count budget is full, every remaining test is rejected.
//! 3. A test whose average duration would push the total past the time budget is rejected, unless
//!    nothing has been admitted yet. This keeps a single slow test from producing an empty
//!    selection.
//!
//! Every known test receives an [`Explanation`], whether or not it was admitted.

use crate::{
    helpers::round_to,
    history::History,
    impact::{ChangedFiles, affected_tests},
    scoring::{ScoringWeights, TestScore, score_tests},
};
use ste_metadata::{ExplanationSummary, SelectionReason, TestId};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};
use tracing::debug;

/// Upper bounds on a selection. `None` means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SelectionBudget {
    /// The maximum number of tests to admit.
    pub max_tests: Option<usize>,

    /// The maximum cumulative average duration of admitted tests, in seconds.
    pub max_seconds: Option<f64>,
}

impl SelectionBudget {
    /// Creates a budget from configuration values, where 0 means unlimited.
    pub fn from_config(budget_tests: usize, budget_seconds: f64) -> Self {
        Self {
            max_tests: (budget_tests > 0).then_some(budget_tests),
            max_seconds: (budget_seconds > 0.0).then_some(budget_seconds),
        }
    }

    /// An unlimited budget.
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Why a test was scored and admitted or rejected the way it was.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Explanation {
    /// The score and its components.
    pub score: TestScore,
    /// Whether the test was admitted.
    pub included: bool,
    /// The reason for admission or rejection.
    pub reason: SelectionReason,
}

impl Explanation {
    /// Converts this explanation to its serializable form, rounding for display.
    pub fn to_summary(&self) -> ExplanationSummary {
        ExplanationSummary {
            affected: self.score.affected,
            fail_rate: round_to(self.score.fail_rate, 3),
            flaky_rate: round_to(self.score.flaky_rate, 3),
            runtime_norm: round_to(self.score.runtime_norm, 3),
            weights: self.score.weights.to_summary(),
            score: round_to(self.score.score, 4),
            included: self.included,
            reason: self.reason,
        }
    }
}

/// The result of a selection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionOutcome {
    /// Admitted tests, in priority order.
    pub selected: Vec<TestId>,

    /// An explanation for every known test.
    pub explanations: BTreeMap<TestId, Explanation>,

    /// The tests affected by the changed files.
    pub affected: BTreeSet<TestId>,

    /// The sum of the average durations of admitted tests, in seconds.
    pub elapsed: f64,
}

impl SelectionOutcome {
    /// Returns explanations in their serializable form.
    pub fn explanation_summaries(&self) -> BTreeMap<TestId, ExplanationSummary> {
        self.explanations
            .iter()
            .map(|(test_id, explanation)| (test_id.clone(), explanation.to_summary()))
            .collect()
    }
}

/// Runs the full selection pipeline against a history.
pub fn select_tests(
    history: &History,
    changed: &ChangedFiles,
    weights: &ScoringWeights,
    budget: &SelectionBudget,
) -> SelectionOutcome {
    let affected = affected_tests(history, changed);
    let scores = score_tests(history, &affected, weights);
    let (selected, explanations, elapsed) = admit(scores, budget);

    SelectionOutcome {
        selected,
        explanations,
        affected,
        elapsed,
    }
}

/// Compares two scored tests by priority: affected first, then descending score, then test ID.
fn priority_order(a: (&TestId, &TestScore), b: (&TestId, &TestScore)) -> Ordering {
    b.1.affected
        .cmp(&a.1.affected)
        .then_with(|| b.1.score.total_cmp(&a.1.score))
        .then_with(|| a.0.cmp(b.0))
}

/// Walks scored tests in priority order and admits them under the budget.
pub fn admit(
    scores: BTreeMap<TestId, TestScore>,
    budget: &SelectionBudget,
) -> (Vec<TestId>, BTreeMap<TestId, Explanation>, f64) {
    let mut ordered: Vec<_> = scores.iter().collect();
    ordered.sort_by(|a, b| priority_order(*a, *b));

    let mut selected = Vec::new();
    let mut rejected: BTreeMap<&TestId, SelectionReason> = BTreeMap::new();
    let mut elapsed = 0.0;

    for (test_id, score) in ordered {
        if budget
            .max_tests
            .is_some_and(|max_tests| selected.len() >= max_tests)
        {
            rejected.insert(test_id, SelectionReason::TestCountBudget);
            continue;
        }

        if let Some(max_seconds) = budget.max_seconds {
            if elapsed + score.avg_duration > max_seconds && !selected.is_empty() {
                rejected.insert(test_id, SelectionReason::TimeBudget);
                continue;
            }
        }

        selected.push(test_id.clone());
        elapsed += score.avg_duration;
    }

    let admitted: BTreeSet<&TestId> = selected.iter().collect();
    let explanations = scores
        .iter()
        .map(|(test_id, score)| {
            let included = admitted.contains(test_id);
            let reason = if included {
                if score.affected {
                    SelectionReason::Affected
                } else {
                    SelectionReason::HighRisk
                }
            } else if let Some(reason) = rejected.get(test_id) {
                *reason
            } else if score.affected {
                SelectionReason::AffectedOverBudget
            } else {
                SelectionReason::Deprioritized
            };
            let explanation = Explanation {
                score: *score,
                included,
                reason,
            };
            (test_id.clone(), explanation)
        })
        .collect();

    debug!(
        selected = selected.len(),
        rejected = rejected.len(),
        elapsed,
        "admitted tests under budget"
    );
    (selected, explanations, elapsed)
}
