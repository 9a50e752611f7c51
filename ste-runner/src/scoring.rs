// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted risk scores for known tests.

use crate::history::History;
use serde::Deserialize;
use ste_metadata::{TestId, WeightsSummary};
use std::collections::{BTreeMap, BTreeSet};

/// Guards the runtime normalization against a zero span when all durations are equal.
const RUNTIME_SPAN_EPSILON: f64 = 1e-6;

/// Weights applied to the components of a test's risk score.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScoringWeights {
    /// Weight of the 0/1 affected indicator.
    pub affected: f64,
    /// Weight of the historical failure rate.
    pub fail_rate: f64,
    /// Weight of the flaky rate.
    pub flaky_rate: f64,
    /// Weight of the normalized runtime.
    pub runtime: f64,
}

impl ScoringWeights {
    /// Returns the weights as `(key, value)` pairs, with keys as they appear in config files.
    pub fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("affected", self.affected),
            ("fail-rate", self.fail_rate),
            ("flaky-rate", self.flaky_rate),
            ("runtime", self.runtime),
        ]
    }

    /// Converts these weights to their serializable form.
    pub fn to_summary(&self) -> WeightsSummary {
        WeightsSummary {
            affected: self.affected,
            fail_rate: self.fail_rate,
            flaky_rate: self.flaky_rate,
            runtime: self.runtime,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            affected: 1.0,
            fail_rate: 0.5,
            flaky_rate: 0.2,
            runtime: 0.1,
        }
    }
}

/// The components and composite risk score of a single test.
///
/// Components are kept at full precision; rounding only happens for display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestScore {
    /// Whether the test is affected by the changed files.
    pub affected: bool,
    /// Historical failure rate.
    pub fail_rate: f64,
    /// Flaky rate, see [`TestStat::flaky_rate`](crate::history::TestStat::flaky_rate).
    pub flaky_rate: f64,
    /// Min-max normalized average duration, in `[0, 1]`.
    pub runtime_norm: f64,
    /// The average duration in seconds, used for the time budget.
    pub avg_duration: f64,
    /// The weights used.
    pub weights: ScoringWeights,
    /// The weighted sum of the components.
    pub score: f64,
}

impl TestScore {
    fn new(
        affected: bool,
        fail_rate: f64,
        flaky_rate: f64,
        runtime_norm: f64,
        avg_duration: f64,
        weights: ScoringWeights,
    ) -> Self {
        let score = weights.affected * f64::from(u8::from(affected))
            + weights.fail_rate * fail_rate
            + weights.flaky_rate * flaky_rate
            + weights.runtime * runtime_norm;
        Self {
            affected,
            fail_rate,
            flaky_rate,
            runtime_norm,
            avg_duration,
            weights,
            score,
        }
    }
}

/// Min-max normalizes average durations over the tests with a positive duration.
///
/// Tests with no recorded duration normalize to 0.
pub fn runtime_norms(history: &History) -> BTreeMap<TestId, f64> {
    let positive = history
        .tests
        .values()
        .map(|stat| stat.avg_duration)
        .filter(|duration| *duration > 0.0);
    let bounds = positive.fold(None, |acc: Option<(f64, f64)>, duration| match acc {
        None => Some((duration, duration)),
        Some((min, max)) => Some((min.min(duration), max.max(duration))),
    });

    history
        .tests
        .iter()
        .map(|(test_id, stat)| {
            let norm = match bounds {
                Some((min, max)) if stat.avg_duration > 0.0 => {
                    (stat.avg_duration - min) / (max - min).max(RUNTIME_SPAN_EPSILON)
                }
                _ => 0.0,
            };
            (test_id.clone(), norm)
        })
        .collect()
}

/// Scores every test in the history.
pub fn score_tests(
    history: &History,
    affected: &BTreeSet<TestId>,
    weights: &ScoringWeights,
) -> BTreeMap<TestId, TestScore> {
    let norms = runtime_norms(history);
    history
        .tests
        .iter()
        .map(|(test_id, stat)| {
            let score = TestScore::new(
                affected.contains(test_id),
                stat.fail_rate(),
                stat.flaky_rate(),
                norms.get(test_id).copied().unwrap_or(0.0),
                stat.avg_duration,
                *weights,
            );
            (test_id.clone(), score)
        })
        .collect()
}
