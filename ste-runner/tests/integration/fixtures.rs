// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use ste_metadata::TestId;
use ste_runner::{
    errors::TestCommandError,
    history::{History, TestStat},
    outcomes::{RunOutcomes, TestOutcome, TestRunRecord},
    test_command::{CoverageRun, TestCommandRunner},
};
use std::cell::RefCell;

pub(crate) const PROJECT_ROOT: &str = "/work/repo";

pub(crate) const CHARGE: &str = "tests/test_payments.py::test_create_payment_success";
pub(crate) const INVALID: &str = "tests/test_payments.py::test_create_payment_invalid_amount";
pub(crate) const GET: &str = "tests/test_payments.py::test_get_payment_ok";
pub(crate) const ROUND: &str = "tests/test_utils.py::test_round_amount";

pub(crate) fn project_root() -> &'static Utf8Path {
    Utf8Path::new(PROJECT_ROOT)
}

/// Coverage data shaped like `coverage json --show-contexts` after a pytest-cov run with
/// `--cov-context=test`.
pub(crate) fn payments_coverage() -> Value {
    json!({
        "meta": {"version": "7.4.0", "show_contexts": true},
        "files": {
            "/work/repo/app/payments.py": {
                "contexts": {
                    "3": ["", format!("{CHARGE}|run"), format!("{INVALID}|run")],
                    "9": [format!("{GET}|run")]
                },
                "functions": {
                    "get_payment": {"contexts": {"10": [format!("{GET}|run")]}}
                }
            },
            "/work/repo/app/utils.py": {
                "contexts": {"1": ["", format!("{ROUND}|run"), format!("{CHARGE}|setup")]}
            },
            "/work/repo/tests/test_payments.py": {
                "contexts": {"5": [format!("{CHARGE}|run")]}
            }
        }
    })
}

pub(crate) fn payments_outcomes(failing: &[&str]) -> RunOutcomes {
    [(CHARGE, 0.4), (INVALID, 0.1), (GET, 0.2), (ROUND, 2.5)]
        .into_iter()
        .map(|(id, duration)| {
            let outcome = if failing.contains(&id) {
                TestOutcome::Failed
            } else {
                TestOutcome::Passed
            };
            (TestId::new(id), TestRunRecord::new(outcome, duration))
        })
        .collect()
}

pub(crate) fn stat(id: &str, runs: u64, fails: u64, flaky: bool, avg_duration: f64) -> TestStat {
    TestStat {
        nodeid: TestId::new(id),
        runs,
        fails,
        flaky,
        avg_duration,
    }
}

pub(crate) fn history_from(stats: impl IntoIterator<Item = TestStat>) -> History {
    History {
        tests: stats
            .into_iter()
            .map(|stat| (stat.nodeid.clone(), stat))
            .collect(),
        ..History::default()
    }
}

/// What a [`FakeRunner`] was asked to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum FakeCall {
    RunWithCoverage(Utf8PathBuf),
    RunSelected(Utf8PathBuf, Vec<TestId>),
    Probe(Utf8PathBuf),
}

/// A test command that returns canned results.
pub(crate) struct FakeRunner {
    pub(crate) coverage_run: CoverageRun,
    pub(crate) probe_results: Vec<(TestId, Vec<String>)>,
    pub(crate) selected_exit_code: i32,
    pub(crate) calls: RefCell<Vec<FakeCall>>,
}

impl FakeRunner {
    pub(crate) fn new(coverage: Value, outcomes: RunOutcomes) -> Self {
        Self {
            coverage_run: CoverageRun {
                exit_code: 0,
                coverage,
                outcomes,
            },
            probe_results: Vec::new(),
            selected_exit_code: 0,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<FakeCall> {
        self.calls.borrow().clone()
    }
}

impl TestCommandRunner for FakeRunner {
    fn run_with_coverage(&self, project: &Utf8Path) -> Result<CoverageRun, TestCommandError> {
        self.calls
            .borrow_mut()
            .push(FakeCall::RunWithCoverage(project.to_owned()));
        Ok(self.coverage_run.clone())
    }

    fn run_selected(
        &self,
        project: &Utf8Path,
        test_ids: &[TestId],
    ) -> Result<i32, TestCommandError> {
        self.calls
            .borrow_mut()
            .push(FakeCall::RunSelected(project.to_owned(), test_ids.to_vec()));
        Ok(self.selected_exit_code)
    }

    fn probe(&self, project: &Utf8Path) -> Result<Vec<(TestId, Vec<String>)>, TestCommandError> {
        self.calls
            .borrow_mut()
            .push(FakeCall::Probe(project.to_owned()));
        Ok(self.probe_results.clone())
    }
}
