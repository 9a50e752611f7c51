// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8Path;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use serde_json::json;
use ste_metadata::{SelectionReason, TestId};
use ste_runner::{
    coverage_map::CoverageMaps,
    history::History,
    impact::ChangedFiles,
    scoring::ScoringWeights,
    selector::{SelectionBudget, select_tests},
};

#[test]
fn empty_history() {
    let outcome = select_tests(
        &History::new(),
        &ChangedFiles::new(["a.py"]),
        &ScoringWeights::default(),
        &SelectionBudget::from_config(25, 120.0),
    );
    assert_eq!(outcome.selected, Vec::<TestId>::new());
    assert!(outcome.explanations.is_empty());
    assert_eq!(outcome.elapsed, 0.0);
}

#[test]
fn affected_test_is_selected_with_reason() {
    let mut history = history_from([stat("tests/test_x.py::t1", 4, 1, false, 2.0)]);
    history.coverage_map = btreemap! {
        "src/x.py".to_owned() => vec![TestId::new("tests/test_x.py::t1")],
    };
    history.test_to_files = btreemap! {
        TestId::new("tests/test_x.py::t1") => vec!["src/x.py".to_owned()],
    };

    let outcome = select_tests(
        &history,
        &ChangedFiles::new(["src/x.py"]),
        &ScoringWeights::default(),
        &SelectionBudget::unlimited(),
    );
    assert_eq!(outcome.selected, vec![TestId::new("tests/test_x.py::t1")]);

    let summary = outcome.explanation_summaries()[&TestId::new("tests/test_x.py::t1")].clone();
    assert!(summary.affected);
    assert!(summary.included);
    assert_eq!(summary.reason, SelectionReason::Affected);
    assert_eq!(summary.fail_rate, 0.25);
    assert_eq!(summary.flaky_rate, 0.0);
    assert_eq!(summary.runtime_norm, 0.0);
    assert_eq!(summary.score, 1.125);
}

#[test]
fn test_count_budget_of_one() {
    let mut history = history_from([
        stat("t.py::a", 2, 0, false, 1.0),
        stat("t.py::b", 2, 0, false, 1.0),
    ]);
    history.coverage_map = btreemap! {
        "app.py".to_owned() => vec![TestId::new("t.py::a"), TestId::new("t.py::b")],
    };

    let outcome = select_tests(
        &history,
        &ChangedFiles::new(["app.py"]),
        &ScoringWeights::default(),
        &SelectionBudget::from_config(1, 0.0),
    );
    assert_eq!(outcome.selected.len(), 1);
    let rejected: Vec<_> = outcome
        .explanations
        .values()
        .filter(|explanation| !explanation.included)
        .map(|explanation| explanation.reason)
        .collect();
    assert_eq!(rejected, vec![SelectionReason::TestCountBudget]);
}

#[test]
fn single_slow_test_overrides_time_budget() {
    let history = history_from([stat("t.py::slow", 1, 0, false, 500.0)]);
    let outcome = select_tests(
        &history,
        &ChangedFiles::new(Vec::<String>::new()),
        &ScoringWeights::default(),
        &SelectionBudget::from_config(0, 100.0),
    );
    assert_eq!(outcome.selected, vec![TestId::new("t.py::slow")]);
    assert_eq!(outcome.elapsed, 500.0);
}

#[test]
fn list_contexts_with_label() {
    let raw = json!({
        "tests/test_x.py": {"contexts": ["UnitTest: tests/test_x.py::test_y"]}
    });
    let maps = CoverageMaps::build(&raw, Utf8Path::new("/repo"));
    assert_eq!(
        maps.file_to_tests["tests/test_x.py"],
        vec![TestId::new("tests/test_x.py::test_y")]
    );
}

#[test]
fn pipeline_is_deterministic() {
    let mut history = History::new();
    history.replace_coverage(CoverageMaps::build(&payments_coverage(), project_root()));
    let outcomes = payments_outcomes(&[INVALID]);
    history.record_run(&outcomes, "tests", chrono::Utc::now());
    history.record_run(&payments_outcomes(&[]), "tests", chrono::Utc::now());

    let run = || {
        let outcome = select_tests(
            &history,
            &ChangedFiles::new(["app/utils.py", "README.md"]),
            &ScoringWeights::default(),
            &SelectionBudget::from_config(3, 2.7),
        );
        serde_json::to_string(&outcome.explanation_summaries()).map(|json| (outcome.selected, json))
    };
    let first = run().unwrap();
    let second = run().unwrap();
    assert_eq!(first, second);

    // CHARGE and ROUND both cover utils.py, and ROUND scores higher on runtime. CHARGE no
    // longer fits after ROUND, but the riskiest unaffected test still does.
    assert_eq!(first.0, vec![TestId::new(ROUND), TestId::new(INVALID)]);
}
