// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-test outcomes of a single recorded run.

use serde_json::{Map, Value};
use ste_metadata::TestId;
use std::{collections::BTreeMap, fmt};
use tracing::debug;

/// The outcome of a single test in a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestOutcome {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// Any other outcome reported by the test tool, such as `skipped` or `xfailed`.
    ///
    /// These count as a run but not as a failure.
    Other(String),
}

impl TestOutcome {
    /// Parses an outcome string as reported by the test tool.
    pub fn from_tool_str(s: &str) -> Self {
        match s {
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns true if this outcome counts as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Other(other) => write!(f, "{other}"),
        }
    }
}

/// The outcome and wall-clock duration of a single test in a run.
#[derive(Clone, Debug, PartialEq)]
pub struct TestRunRecord {
    /// The outcome.
    pub outcome: TestOutcome,

    /// The duration in seconds. Always finite and non-negative.
    pub duration: f64,
}

impl TestRunRecord {
    /// Creates a new record, clamping invalid durations to zero.
    pub fn new(outcome: TestOutcome, duration: f64) -> Self {
        Self {
            outcome,
            duration: sanitize_duration(duration),
        }
    }
}

/// A batch of per-test outcomes from one physical run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOutcomes {
    tests: BTreeMap<TestId, TestRunRecord>,
}

impl RunOutcomes {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record for a test, replacing any earlier record for the same test.
    pub fn insert(&mut self, test_id: TestId, record: TestRunRecord) {
        self.tests.insert(test_id, record);
    }

    /// Parses outcomes as written by the test tool.
    ///
    /// Three shapes are accepted:
    ///
    /// * `{"tests": {"<id>": {"outcome": "passed", "duration": 0.1}}}`
    /// * the inner map on its own, `{"<id>": {"outcome": ..., "duration": ...}}`
    /// * `{"tests": [{"nodeid": "<id>", "outcome": ..., "call": {"duration": ...}}]}`, as written
    ///   by pytest-json-report
    ///
    /// Entries without an outcome are skipped. Missing, negative or non-finite durations are
    /// treated as zero.
    pub fn from_json_value(value: &Value) -> Self {
        let mut outcomes = Self::new();
        let Some(obj) = value.as_object() else {
            debug!("run outcomes are not an object, ignoring");
            return outcomes;
        };

        match obj.get("tests") {
            Some(Value::Object(tests)) => outcomes.extend_from_map(tests),
            Some(Value::Array(tests)) => {
                for entry in tests {
                    let id = entry.get("nodeid").and_then(Value::as_str);
                    match (id, parse_record(entry)) {
                        (Some(id), Some(record)) => outcomes.insert(TestId::new(id), record),
                        _ => debug!("skipping malformed run outcome entry: {entry}"),
                    }
                }
            }
            _ => outcomes.extend_from_map(obj),
        }

        outcomes
    }

    fn extend_from_map(&mut self, tests: &Map<String, Value>) {
        for (id, entry) in tests {
            match parse_record(entry) {
                Some(record) => self.insert(TestId::new(id), record),
                None => debug!("skipping malformed run outcome for `{id}`"),
            }
        }
    }

    /// Iterates over the records in test ID order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&TestId, &TestRunRecord)> + '_ {
        self.tests.iter()
    }

    /// Returns the number of tests in this batch.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if this batch is empty.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Returns the number of failing tests in this batch.
    pub fn failed_count(&self) -> usize {
        self.tests
            .values()
            .filter(|record| record.outcome.is_failure())
            .count()
    }
}

impl FromIterator<(TestId, TestRunRecord)> for RunOutcomes {
    fn from_iter<T: IntoIterator<Item = (TestId, TestRunRecord)>>(iter: T) -> Self {
        Self {
            tests: iter.into_iter().collect(),
        }
    }
}

fn parse_record(entry: &Value) -> Option<TestRunRecord> {
    let outcome = entry.get("outcome")?.as_str()?;
    let duration = entry
        .get("duration")
        .and_then(Value::as_f64)
        .or_else(|| entry.get("call")?.get("duration")?.as_f64())
        .unwrap_or(0.0);
    Some(TestRunRecord::new(TestOutcome::from_tool_str(outcome), duration))
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mapping_shape() {
        let value = json!({
            "tests": {
                "t.py::a": {"outcome": "passed", "duration": 0.5},
                "t.py::b": {"outcome": "failed", "duration": 1.5},
                "t.py::c": {"outcome": "skipped", "duration": 0.0}
            },
            "exitstatus": 1
        });
        let outcomes = RunOutcomes::from_json_value(&value);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.failed_count(), 1);
        let records: Vec<_> = outcomes.iter().collect();
        assert_eq!(records[0].0.as_str(), "t.py::a");
        assert_eq!(records[0].1.duration, 0.5);
        assert_eq!(records[2].1.outcome, TestOutcome::Other("skipped".to_owned()));
    }

    #[test]
    fn parses_bare_mapping() {
        let value = json!({"t.py::a": {"outcome": "failed", "duration": 2}});
        let outcomes = RunOutcomes::from_json_value(&value);
        assert_eq!(outcomes.failed_count(), 1);
        assert_eq!(outcomes.iter().next().unwrap().1.duration, 2.0);
    }

    #[test]
    fn parses_list_shape() {
        let value = json!({
            "tests": [
                {"nodeid": "t.py::a", "outcome": "passed", "call": {"duration": 0.25}},
                {"nodeid": "t.py::b", "outcome": "failed", "duration": 3.0},
                {"outcome": "passed"}
            ]
        });
        let outcomes = RunOutcomes::from_json_value(&value);
        assert_eq!(outcomes.len(), 2);
        let records: BTreeMap<_, _> = outcomes.iter().collect();
        assert_eq!(records[&TestId::new("t.py::a")].duration, 0.25);
        assert_eq!(records[&TestId::new("t.py::b")].outcome, TestOutcome::Failed);
    }

    #[test]
    fn invalid_durations_become_zero() {
        let value = json!({
            "t.py::a": {"outcome": "passed", "duration": -1.0},
            "t.py::b": {"outcome": "passed", "duration": "slow"},
            "t.py::c": {"outcome": "passed"},
            "t.py::d": {"duration": 1.0}
        });
        let outcomes = RunOutcomes::from_json_value(&value);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, record)| record.duration == 0.0));
    }

    #[test]
    fn non_object_is_empty() {
        assert!(RunOutcomes::from_json_value(&json!(null)).is_empty());
        assert!(RunOutcomes::from_json_value(&json!(["t.py::a"])).is_empty());
    }
}
