// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8Path;
use chrono::{TimeZone, Utc};
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use serde_json::Value;
use ste_metadata::{ReportSummary, SelectionReason, SelectionSummary, TestId};
use ste_runner::{
    history::History,
    impact::ChangedFiles,
    pipeline::{CoverageSource, RecordOptions, record_run},
    report::ReportWriter,
    scoring::ScoringWeights,
    selector::{SelectionBudget, select_tests},
    store::Store,
    test_command::{PytestCommand, TestCommandRunner},
};

fn options(probe_fallback: bool) -> RecordOptions<'static> {
    RecordOptions {
        project_root: project_root(),
        project: Utf8Path::new("tests"),
        probe_fallback,
        now: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    }
}

#[test]
fn record_then_select() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    let store = Store::new(dir.path().join("state"));
    let runner = FakeRunner::new(payments_coverage(), payments_outcomes(&[INVALID]));

    let mut history = store.load_history()?;
    let summary = record_run(&mut history, &runner, options(true))?;
    assert_eq!(summary.coverage_source, CoverageSource::Contexts);
    assert_eq!((summary.test_count, summary.failed_count), (4, 1));
    assert_eq!(summary.file_count, 3);
    assert_eq!(
        runner.calls(),
        vec![FakeCall::RunWithCoverage("tests".into())],
        "contexts were present, so no probe"
    );
    store.save_history(&history)?;

    let history = store.load_history()?;
    assert_eq!(
        history.coverage_map["app/payments.py"],
        vec![TestId::new(INVALID), TestId::new(CHARGE), TestId::new(GET)]
    );
    assert_eq!(history.runs.len(), 1);
    assert_eq!(history.runs[0].project, "tests");
    assert_eq!(history.runs[0].failed, 1);

    let outcome = select_tests(
        &history,
        &ChangedFiles::new(["app/payments.py"]),
        &ScoringWeights::default(),
        &SelectionBudget::from_config(2, 0.0),
    );
    // INVALID failed once, so it outranks the other affected tests.
    assert_eq!(outcome.selected, vec![TestId::new(INVALID), TestId::new(CHARGE)]);
    assert_eq!(
        outcome.explanations[&TestId::new(GET)].reason,
        SelectionReason::TestCountBudget
    );
    assert_eq!(
        outcome.explanations[&TestId::new(ROUND)].reason,
        SelectionReason::TestCountBudget
    );

    let selection = SelectionSummary {
        profile: "default".to_owned(),
        project: "tests".into(),
        base: None,
        head: None,
        changed_files: vec!["app/payments.py".to_owned()],
        selected: outcome.selected.clone(),
        budget_tests: 2,
        budget_seconds: 0.0,
        estimated_seconds: outcome.elapsed,
    };
    store.save_selection(&selection)?;

    let writer = ReportWriter::new(dir.path().join("web/data"));
    let path = writer.write(
        &history,
        Some(&selection),
        outcome.explanation_summaries(),
        options(true).now,
    )?;
    let report: ReportSummary = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    ensure!(report.selection.as_ref() == Some(&selection), "selection is echoed");
    ensure!(report.explanations.len() == 4, "every test is explained");
    assert_eq!(report.history["tests"][INVALID]["flaky"], Value::from(0));

    let loaded = store.load_selection()?;
    let exit_code = runner.run_selected(&loaded.project, &loaded.selected)?;
    assert_eq!(exit_code, 0);
    assert_eq!(
        runner.calls().last(),
        Some(&FakeCall::RunSelected(
            "tests".into(),
            vec![TestId::new(INVALID), TestId::new(CHARGE)]
        ))
    );

    Ok(())
}

#[test]
fn probe_fallback_when_contexts_missing() -> Result<()> {
    let coverage = serde_json::json!({
        "files": {"/work/repo/app/payments.py": {"summary": {"covered_lines": 10}}}
    });
    let mut runner = FakeRunner::new(coverage, payments_outcomes(&[]));
    runner.probe_results = vec![
        (
            TestId::new(CHARGE),
            vec!["/work/repo/app/payments.py".to_owned(), "app\\utils.py".to_owned()],
        ),
        (TestId::new(ROUND), vec!["app/utils.py".to_owned()]),
    ];

    let mut history = History::new();
    let summary = record_run(&mut history, &runner, options(true))?;
    assert_eq!(summary.coverage_source, CoverageSource::Probe);
    assert_eq!(
        runner.calls(),
        vec![
            FakeCall::RunWithCoverage("tests".into()),
            FakeCall::Probe("tests".into()),
        ]
    );
    assert_eq!(
        history.coverage_map["app/utils.py"],
        vec![TestId::new(CHARGE), TestId::new(ROUND)]
    );
    assert_eq!(
        history.test_to_files[&TestId::new(CHARGE)],
        vec!["app/payments.py".to_owned(), "app/utils.py".to_owned()]
    );
    Ok(())
}

#[test]
fn no_probe_when_disabled() -> Result<()> {
    let runner = FakeRunner::new(Value::Null, payments_outcomes(&[]));
    let mut history = History::new();
    let summary = record_run(&mut history, &runner, options(false))?;
    assert_eq!(summary.coverage_source, CoverageSource::Unavailable);
    assert_eq!(runner.calls().len(), 1);
    assert!(history.coverage_map.is_empty());
    assert_eq!(history.tests.len(), 4, "outcomes are still recorded");
    Ok(())
}

#[test]
fn recording_replaces_coverage_but_accumulates_stats() -> Result<()> {
    let mut history = History::new();
    record_run(
        &mut history,
        &FakeRunner::new(payments_coverage(), payments_outcomes(&[CHARGE])),
        options(false),
    )?;
    record_run(
        &mut history,
        &FakeRunner::new(Value::Null, payments_outcomes(&[])),
        options(false),
    )?;

    assert!(history.coverage_map.is_empty(), "second build replaced the maps");
    let charge = &history.tests[&TestId::new(CHARGE)];
    assert_eq!((charge.runs, charge.fails, charge.flaky), (2, 1, true));
    assert_eq!(history.runs.len(), 2);
    Ok(())
}

// `true` accepts any arguments, exits 0 and writes nothing, like a pytest missing its plugins.
#[cfg(unix)]
#[test]
fn outputs_from_an_earlier_run_are_not_recorded_again() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    let store = Store::new(dir.path().join("state"));
    std::fs::create_dir_all(store.dir())?;
    std::fs::write(
        store.outcomes_path(),
        r#"{"tests": {"t.py::a": {"outcome": "failed", "duration": 1.0}}}"#,
    )?;
    std::fs::write(
        store.coverage_path(),
        r#"{"files": {"app.py": {"contexts": ["t.py::a"]}}}"#,
    )?;

    let runner = PytestCommand::new("true", "", dir.path(), store.clone())?;
    let mut history = History::new();
    for _ in 0..2 {
        let summary = record_run(&mut history, &runner, options(false))?;
        assert_eq!(summary.test_count, 0);
        assert_eq!(summary.coverage_source, CoverageSource::Unavailable);
    }

    ensure!(
        history.tests.is_empty(),
        "no test ran, but history has {:?}",
        history.tests
    );
    assert!(history.coverage_map.is_empty());
    assert!(!store.outcomes_path().exists());
    assert!(!store.coverage_path().exists());
    Ok(())
}
