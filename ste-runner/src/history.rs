// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-test statistics accumulated across recorded runs.

use crate::{coverage_map::CoverageMaps, errors::HistoryViolation, outcomes::RunOutcomes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ste_metadata::TestId;
use std::collections::BTreeMap;
use tracing::info;

/// Statistics for a single test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestStat {
    /// The test ID. Duplicated from the key for readability of the stored file.
    pub nodeid: TestId,

    /// The number of recorded runs.
    #[serde(default)]
    pub runs: u64,

    /// The number of recorded failures. Never greater than `runs`.
    #[serde(default)]
    pub fails: u64,

    /// Whether the test has both passed and failed at least once.
    ///
    /// Stored as `0` or `1`.
    #[serde(default, with = "flaky_flag")]
    pub flaky: bool,

    /// Running mean of observed durations, in seconds.
    #[serde(default)]
    pub avg_duration: f64,
}

impl TestStat {
    /// Creates a statistic for a test that has never been recorded.
    pub fn new(nodeid: TestId) -> Self {
        Self {
            nodeid,
            runs: 0,
            fails: 0,
            flaky: false,
            avg_duration: 0.0,
        }
    }

    /// The fraction of runs that failed, or 0 for a test with no runs.
    pub fn fail_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.fails as f64 / self.runs as f64
        }
    }

    /// The flaky flag divided by the number of runs, or 0 for a test with no runs.
    ///
    /// This is not a probability: for a flaky test it decays as `1 / runs`.
    pub fn flaky_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            f64::from(u8::from(self.flaky)) / self.runs as f64
        }
    }

    fn record(&mut self, failed: bool, duration: f64) {
        self.runs += 1;
        if failed {
            self.fails += 1;
        }
        self.flaky = self.fails > 0 && self.runs - self.fails > 0;
        self.avg_duration += (duration - self.avg_duration) / self.runs.max(1) as f64;
    }
}

/// A summary of one recorded run, appended to [`History::runs`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    /// When the run was recorded, as a Unix timestamp in seconds.
    pub time: i64,

    /// The project path the run was recorded for.
    #[serde(default)]
    pub project: String,

    /// The number of tests in the run.
    pub count: usize,

    /// The number of failing tests in the run.
    pub failed: usize,
}

/// Accumulated state across runs: per-test statistics and the most recent coverage maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Per-test statistics.
    #[serde(default)]
    pub tests: BTreeMap<TestId, TestStat>,

    /// Normalized file path to the tests that executed it.
    #[serde(default)]
    pub coverage_map: BTreeMap<String, Vec<TestId>>,

    /// Test to the normalized file paths it executed.
    #[serde(default)]
    pub test_to_files: BTreeMap<TestId, Vec<String>>,

    /// Append-only log of recorded runs.
    #[serde(default)]
    pub runs: Vec<RunLogEntry>,

    /// When this history was last updated, as a Unix timestamp in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no test has ever been recorded.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Replaces the coverage maps wholesale with a new build.
    pub fn replace_coverage(&mut self, maps: CoverageMaps) {
        let CoverageMaps {
            file_to_tests,
            test_to_files,
        } = maps;
        self.coverage_map = file_to_tests;
        self.test_to_files = test_to_files;
    }

    /// Applies a batch of outcomes from one run.
    ///
    /// Every call counts as a new run: submitting the same batch twice records it twice.
    pub fn record_run(&mut self, outcomes: &RunOutcomes, project: &str, now: DateTime<Utc>) {
        for (test_id, record) in outcomes.iter() {
            self.tests
                .entry(test_id.clone())
                .or_insert_with(|| TestStat::new(test_id.clone()))
                .record(record.outcome.is_failure(), record.duration);
        }

        let entry = RunLogEntry {
            time: now.timestamp(),
            project: project.to_owned(),
            count: outcomes.len(),
            failed: outcomes.failed_count(),
        };
        info!(
            count = entry.count,
            failed = entry.failed,
            "recorded run for {project}"
        );
        self.runs.push(entry);
        self.updated_at = Some(now.timestamp());
    }

    /// Checks that every statistic could have been produced by [`Self::record_run`].
    pub fn validate(&self) -> Result<(), HistoryViolation> {
        for (test_id, stat) in &self.tests {
            if stat.fails > stat.runs {
                return Err(HistoryViolation::FailsExceedRuns {
                    test_id: test_id.to_string(),
                    runs: stat.runs,
                    fails: stat.fails,
                });
            }
            if !stat.avg_duration.is_finite() || stat.avg_duration < 0.0 {
                return Err(HistoryViolation::InvalidDuration {
                    test_id: test_id.to_string(),
                    avg_duration: stat.avg_duration,
                });
            }
        }
        Ok(())
    }
}

/// Serializes a bool as `0`/`1`, and deserializes from either an integer or a bool.
mod flaky_flag {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(flaky: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*flaky))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Int(i64),
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Bool(flaky) => Ok(flaky),
            Repr::Int(0) => Ok(false),
            Repr::Int(1) => Ok(true),
            Repr::Int(other) => Err(D::Error::custom(format!(
                "invalid flaky flag {other}, expected 0 or 1"
            ))),
        }
    }
}
