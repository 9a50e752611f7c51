// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestId;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// The result of a single `ste select` invocation, as written to `selection.json`.
///
/// This echoes the inputs used to compute the selection so that a later `ste run-selected` (or an
/// external consumer) can tell what the selection was based on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// The configuration profile used.
    pub profile: String,

    /// The project (tests path) the selection applies to.
    pub project: Utf8PathBuf,

    /// The base revision of the diff, or `None` if changed files were passed in explicitly.
    #[serde(default)]
    pub base: Option<String>,

    /// The head revision of the diff, or `None` if changed files were passed in explicitly.
    #[serde(default)]
    pub head: Option<String>,

    /// The changed files the selection was computed against.
    pub changed_files: Vec<String>,

    /// The selected tests, in the order they should be run.
    pub selected: Vec<TestId>,

    /// The test-count budget. 0 means unlimited.
    pub budget_tests: usize,

    /// The time budget in seconds. 0 means unlimited.
    #[serde(alias = "budget_time_seconds")]
    pub budget_seconds: f64,

    /// The sum of the average durations of the selected tests, in seconds.
    #[serde(default)]
    pub estimated_seconds: f64,
}

/// The scoring weights used to produce an explanation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightsSummary {
    /// Weight applied to the 0/1 affected indicator.
    pub affected: f64,
    /// Weight applied to the historical failure rate.
    pub fail_rate: f64,
    /// Weight applied to the flaky rate.
    pub flaky_rate: f64,
    /// Weight applied to the normalized runtime.
    pub runtime: f64,
}

/// Why a single test was scored and included or excluded the way it was.
///
/// One of these is produced for every known test, not only the selected ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplanationSummary {
    /// Whether the test's historical coverage overlaps a changed file.
    pub affected: bool,
    /// Failure rate, rounded to 3 decimal places.
    pub fail_rate: f64,
    /// Flaky rate, rounded to 3 decimal places.
    pub flaky_rate: f64,
    /// Min-max normalized runtime, rounded to 3 decimal places.
    pub runtime_norm: f64,
    /// The weights the score was computed with.
    pub weights: WeightsSummary,
    /// The composite score, rounded to 4 decimal places.
    pub score: f64,
    /// Whether the test was admitted into the selection.
    pub included: bool,
    /// The reason for inclusion or exclusion.
    pub reason: SelectionReason,
}

/// The fixed set of reasons attached to an explanation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum SelectionReason {
    /// Included because its coverage overlaps a changed file.
    #[serde(rename = "affected by changed files")]
    Affected,

    /// Included on risk score alone.
    #[serde(rename = "high risk score within budget")]
    HighRisk,

    /// Excluded because the test-count budget was already full.
    #[serde(rename = "excluded by test-count budget")]
    TestCountBudget,

    /// Excluded because admitting it would exceed the time budget.
    #[serde(rename = "excluded by time budget")]
    TimeBudget,

    /// Affected, but not admitted and not given a specific budget reason.
    #[serde(rename = "would be included (affected) but excluded by budgets")]
    AffectedOverBudget,

    /// Not affected, and not admitted.
    #[serde(rename = "deprioritized: lower score than the budget cutoff")]
    Deprioritized,
}

impl SelectionReason {
    /// Returns the human-readable string for this reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Affected => "affected by changed files",
            Self::HighRisk => "high risk score within budget",
            Self::TestCountBudget => "excluded by test-count budget",
            Self::TimeBudget => "excluded by time budget",
            Self::AffectedOverBudget => "would be included (affected) but excluded by budgets",
            Self::Deprioritized => "deprioritized: lower score than the budget cutoff",
        }
    }

    /// Returns true if this reason corresponds to an included test.
    pub fn is_included(self) -> bool {
        matches!(self, Self::Affected | Self::HighRisk)
    }
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The document written to `<report-dir>/latest.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Unix timestamp at which the report was generated.
    pub generated_at: i64,

    /// The most recent selection, if this report was produced by `ste select`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionSummary>,

    /// Explanations for every known test, keyed by test ID.
    #[serde(default)]
    pub explanations: BTreeMap<TestId, ExplanationSummary>,

    /// The history document as stored on disk, or an empty object if there is no history.
    #[serde(default)]
    pub history: serde_json::Value,
}
