// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building file-to-test mappings from raw coverage data.
//!
//! Coverage tools that record *contexts* tag every executed line with labels identifying the
//! test that executed it. This module turns those labels into two inverse mappings:
//! source file to tests, and test to source files.
//!
//! The raw data comes from an external tool whose output shape varies between versions and
//! configurations, so the builder is tolerant: anything it doesn't recognize is skipped rather
//! than reported as an error.

use crate::helpers::normalize_coverage_path;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ste_metadata::TestId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Sections of a per-file coverage record that hold nested records with their own contexts.
const NESTED_SECTIONS: [&str; 2] = ["functions", "classes"];

/// Test phases that pytest-cov appends to a context as `|phase`.
const PYTEST_PHASES: [&str; 3] = ["setup", "run", "teardown"];

/// Mappings between normalized source file paths and the tests that exercise them.
///
/// The two maps are always consistent with each other: a test is listed under a file if and only
/// if that file is listed under the test. Every inner list is sorted, so that building maps from
/// identical input produces identical output.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoverageMaps {
    /// Normalized file path to the tests that executed it.
    pub file_to_tests: BTreeMap<String, Vec<TestId>>,

    /// Test to the normalized file paths it executed.
    pub test_to_files: BTreeMap<TestId, Vec<String>>,
}

impl CoverageMaps {
    /// Builds coverage maps from raw coverage data.
    ///
    /// `raw` is either the full document exported by the coverage tool (with a top-level `files`
    /// object) or the `files` object itself: a map from file path to a record. Each record may
    /// have a `contexts` collection, and `functions` and `classes` sections whose entries have
    /// their own `contexts`. A contexts collection may be a list of context labels, or a map whose
    /// keys are context labels or whose values are lists of context labels.
    ///
    /// File paths are made relative to `project_root` where possible.
    ///
    /// Missing or malformed data produces empty maps.
    pub fn build(raw: &Value, project_root: &Utf8Path) -> Self {
        let Some(files) = files_object(raw) else {
            debug!("coverage data is not an object, producing empty coverage maps");
            return Self::default();
        };

        let mut builder = CoverageMapsBuilder::default();
        for (path, record) in files {
            let Value::Object(record) = record else {
                continue;
            };

            let file = normalize_coverage_path(path, project_root);
            for context in record_contexts(record) {
                if let Some(test_id) = extract_test_id(context) {
                    builder.insert(&file, test_id);
                }
            }
        }

        let maps = builder.finish();
        debug!(
            files = maps.file_to_tests.len(),
            tests = maps.test_to_files.len(),
            "built coverage maps from contexts"
        );
        maps
    }

    /// Builds coverage maps from per-test file lists, as produced by running each test on its own
    /// under coverage.
    ///
    /// File paths go through the same normalization as [`Self::build`].
    pub fn from_probe<I, F>(results: I, project_root: &Utf8Path) -> Self
    where
        I: IntoIterator<Item = (TestId, F)>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let mut builder = CoverageMapsBuilder::default();
        for (test_id, files) in results {
            for file in files {
                let file = normalize_coverage_path(file.as_ref(), project_root);
                builder.insert(&file, test_id.clone());
            }
        }
        builder.finish()
    }

    /// Returns true if no file-test relationships are known.
    pub fn is_empty(&self) -> bool {
        self.file_to_tests.is_empty()
    }
}

#[derive(Debug, Default)]
struct CoverageMapsBuilder {
    file_to_tests: BTreeMap<String, BTreeSet<TestId>>,
    test_to_files: BTreeMap<TestId, BTreeSet<String>>,
}

impl CoverageMapsBuilder {
    fn insert(&mut self, file: &str, test_id: TestId) {
        self.test_to_files
            .entry(test_id.clone())
            .or_default()
            .insert(file.to_owned());
        self.file_to_tests
            .entry(file.to_owned())
            .or_default()
            .insert(test_id);
    }

    fn finish(self) -> CoverageMaps {
        CoverageMaps {
            file_to_tests: self
                .file_to_tests
                .into_iter()
                .map(|(file, tests)| (file, tests.into_iter().collect()))
                .collect(),
            test_to_files: self
                .test_to_files
                .into_iter()
                .map(|(test, files)| (test, files.into_iter().collect()))
                .collect(),
        }
    }
}

fn files_object(raw: &Value) -> Option<&Map<String, Value>> {
    let obj = raw.as_object()?;
    match obj.get("files") {
        Some(Value::Object(files)) => Some(files),
        _ => Some(obj),
    }
}

/// Returns all context labels found at file, function and class level of a file record.
fn record_contexts(record: &Map<String, Value>) -> Vec<&str> {
    let mut contexts = Vec::new();
    if let Some(value) = record.get("contexts") {
        collect_context_labels(value, &mut contexts);
    }

    for section in NESTED_SECTIONS {
        let Some(Value::Object(entries)) = record.get(section) else {
            continue;
        };
        for entry in entries.values() {
            if let Some(value) = entry.get("contexts") {
                collect_context_labels(value, &mut contexts);
            }
        }
    }

    contexts
}

fn collect_context_labels<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(label) => out.push(label),
        Value::Array(items) => {
            for item in items {
                collect_context_labels(item, out);
            }
        }
        Value::Object(entries) => {
            // Keys may be context labels (label -> data), or line numbers whose values are lists
            // of labels. Anything that isn't a test ID is discarded by the caller.
            for (key, item) in entries {
                out.push(key);
                collect_context_labels(item, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Extracts a test ID from a context label.
///
/// Labels may carry any number of leading `label:` prefixes, e.g. `UnitTest: tests/a.py::test_b`.
/// Everything up to the last single colon before the first `::` is dropped. The result is only
/// accepted if it contains the `::` separator.
pub(crate) fn extract_test_id(context: &str) -> Option<TestId> {
    let first_sep = context.find(TestId::SEPARATOR)?;
    let tail = match context[..first_sep].rfind(':') {
        Some(idx) => &context[idx + 1..],
        None => context,
    };
    let tail = tail.trim();

    let tail = match tail.rsplit_once('|') {
        Some((id, phase)) if PYTEST_PHASES.contains(&phase) => id,
        _ => tail,
    };

    tail.contains(TestId::SEPARATOR).then(|| TestId::new(tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;
    use test_strategy::proptest;

    fn root() -> &'static Utf8Path {
        Utf8Path::new("/repo")
    }

    fn ids(ids: &[&str]) -> Vec<TestId> {
        ids.iter().map(|id| TestId::new(id)).collect()
    }

    #[test_case("UnitTest: tests/test_x.py::test_y", Some("tests/test_x.py::test_y"); "labelled")]
    #[test_case("tests/test_x.py::test_y", Some("tests/test_x.py::test_y"); "bare")]
    #[test_case("a: b: tests/test_x.py::test_y", Some("tests/test_x.py::test_y"); "nested labels")]
    #[test_case("tests/test_x.py::test_y[a:b]", Some("tests/test_x.py::test_y[a:b]"); "colon in params")]
    #[test_case("tests/test_x.py::test_y|run", Some("tests/test_x.py::test_y"); "pytest-cov phase")]
    #[test_case("tests/test_x.py::test_y|other", Some("tests/test_x.py::test_y|other"); "unknown suffix kept")]
    #[test_case("tests.test_x.test_y", None; "dotted")]
    #[test_case("UnitTest: tests/test_x.py", None; "no separator")]
    #[test_case("", None; "empty")]
    fn extract_test_id_cases(context: &str, expected: Option<&str>) {
        assert_eq!(extract_test_id(context), expected.map(TestId::new));
    }

    #[test]
    fn contexts_as_list() {
        let raw = json!({
            "tests/test_x.py": {
                "contexts": ["UnitTest: tests/test_x.py::test_y"]
            }
        });
        let maps = CoverageMaps::build(&raw, root());
        assert_eq!(
            maps.file_to_tests["tests/test_x.py"],
            ids(&["tests/test_x.py::test_y"])
        );
        assert_eq!(
            maps.test_to_files[&TestId::new("tests/test_x.py::test_y")],
            vec!["tests/test_x.py".to_owned()]
        );
    }

    #[test]
    fn contexts_as_map_keyed_by_label() {
        let raw = json!({
            "files": {
                "/repo/app/payments.py": {
                    "contexts": {
                        "tests/test_p.py::test_refund": {"lines": [1, 2]},
                        "tests/test_p.py::test_charge": {"lines": [3]},
                        "": {"lines": [4]}
                    }
                }
            }
        });
        let maps = CoverageMaps::build(&raw, root());
        assert_eq!(
            maps.file_to_tests["app/payments.py"],
            ids(&["tests/test_p.py::test_charge", "tests/test_p.py::test_refund"])
        );
    }

    #[test]
    fn contexts_as_map_of_lines() {
        // The coverage.py JSON report maps line numbers to the contexts that executed them.
        let raw = json!({
            "meta": {"show_contexts": true},
            "files": {
                "app/util.py": {
                    "executed_lines": [1, 2],
                    "contexts": {
                        "1": ["", "tests/test_u.py::test_a|run"],
                        "2": ["tests/test_u.py::test_b|run"]
                    }
                }
            }
        });
        let maps = CoverageMaps::build(&raw, root());
        assert_eq!(
            maps.file_to_tests["app/util.py"],
            ids(&["tests/test_u.py::test_a", "tests/test_u.py::test_b"])
        );
    }

    #[test]
    fn function_and_class_contexts_are_merged() {
        let raw = json!({
            "app/payments.py": {
                "contexts": ["tests/test_p.py::test_file_level"],
                "functions": {
                    "charge": {"contexts": {"tests/test_p.py::test_function_level": [10]}},
                    "refund": {"executed_lines": [12]}
                },
                "classes": {
                    "Gateway": {"contexts": ["Suite: tests/test_p.py::TestGateway::test_class_level"]}
                }
            }
        });
        let maps = CoverageMaps::build(&raw, root());
        assert_eq!(
            maps.file_to_tests["app/payments.py"],
            ids(&[
                "tests/test_p.py::TestGateway::test_class_level",
                "tests/test_p.py::test_file_level",
                "tests/test_p.py::test_function_level",
            ])
        );
    }

    #[test]
    fn windows_paths_are_normalized() {
        let raw = json!({
            "app\\payments.py": {"contexts": ["tests/test_p.py::test_a"]},
            "/repo/app/util.py": {"contexts": ["tests/test_p.py::test_a"]}
        });
        let maps = CoverageMaps::build(&raw, root());
        assert_eq!(
            maps.test_to_files[&TestId::new("tests/test_p.py::test_a")],
            vec!["app/payments.py".to_owned(), "app/util.py".to_owned()]
        );
    }

    #[test_case(json!(null); "null")]
    #[test_case(json!({}); "empty object")]
    #[test_case(json!([1, 2, 3]); "array")]
    #[test_case(json!({"files": {}}); "no files")]
    #[test_case(json!({"a.py": 42, "b.py": {"contexts": 7}}); "wrong shapes")]
    fn malformed_input_produces_empty_maps(raw: Value) {
        let maps = CoverageMaps::build(&raw, root());
        assert!(maps.is_empty());
        assert!(maps.test_to_files.is_empty());
    }

    #[test]
    fn from_probe_normalizes_paths() {
        let maps = CoverageMaps::from_probe(
            [
                (
                    TestId::new("tests/test_p.py::test_a"),
                    vec!["/repo/app/payments.py", "/repo/tests/test_p.py"],
                ),
                (TestId::new("tests/test_p.py::test_b"), vec!["app\\payments.py"]),
            ],
            root(),
        );
        assert_eq!(
            maps.file_to_tests["app/payments.py"],
            ids(&["tests/test_p.py::test_a", "tests/test_p.py::test_b"])
        );
        assert_eq!(maps.file_to_tests["tests/test_p.py"], ids(&["tests/test_p.py::test_a"]));
    }

    #[proptest]
    fn maps_are_bidirectionally_consistent(
        #[strategy(proptest::collection::btree_map(
            "[a-c]{1,2}/[a-c]{1,2}\\.py",
            proptest::collection::vec("(L: )?t/test_[a-c]\\.py::test_[a-c]{1,2}", 0..4),
            0..6,
        ))]
        files: BTreeMap<String, Vec<String>>,
    ) {
        let raw = Value::Object(
            files
                .into_iter()
                .map(|(path, contexts)| (path, json!({ "contexts": contexts })))
                .collect(),
        );
        let maps = CoverageMaps::build(&raw, root());

        for (file, tests) in &maps.file_to_tests {
            for test in tests {
                assert!(maps.test_to_files[test].contains(file));
            }
        }
        for (test, files) in &maps.test_to_files {
            for file in files {
                assert!(maps.file_to_tests[file].contains(test));
            }
        }

        // Building twice from the same input gives the same result.
        assert_eq!(maps, CoverageMaps::build(&raw, root()));
    }
}
