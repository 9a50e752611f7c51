// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running the test tool.
//!
//! The selection engine never runs processes itself. [`TestCommandRunner`] is the seam between
//! the engine and the test tool; [`PytestCommand`] implements it by running pytest with the
//! pytest-cov and pytest-json-report plugins.

use crate::{
    errors::{StoreFileKind, StoreReadError, TestCommandError},
    outcomes::RunOutcomes,
    store::{Store, read_json},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::process::ExitStatus;
use ste_metadata::TestId;
use tracing::{debug, info, warn};

/// The result of running the full test suite under coverage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageRun {
    /// The test tool's exit code.
    pub exit_code: i32,

    /// Raw coverage data, with per-test contexts if the tool recorded them.
    pub coverage: Value,

    /// Per-test outcomes.
    pub outcomes: RunOutcomes,
}

/// Runs tests on behalf of ste.
pub trait TestCommandRunner {
    /// Runs every test in `project` under coverage.
    fn run_with_coverage(&self, project: &Utf8Path) -> Result<CoverageRun, TestCommandError>;

    /// Runs the given tests, or every test in `project` if `test_ids` is empty. Returns the test
    /// tool's exit code.
    fn run_selected(&self, project: &Utf8Path, test_ids: &[TestId])
    -> Result<i32, TestCommandError>;

    /// Runs each test in `project` on its own under coverage, returning the files each one
    /// executed.
    ///
    /// This is much slower than [`Self::run_with_coverage`] and is only used when coverage data
    /// has no per-test contexts.
    fn probe(&self, project: &Utf8Path) -> Result<Vec<(TestId, Vec<String>)>, TestCommandError>;
}

/// pytest exit codes that don't indicate a problem with the run itself.
const PYTEST_OK_EXIT_CODES: [i32; 2] = [
    0, // all tests passed
    5, // no tests were collected
];

/// Runs pytest through a Python interpreter.
#[derive(Clone, Debug)]
pub struct PytestCommand {
    python: String,
    extra_args: Vec<String>,
    cwd: Utf8PathBuf,
    store: Store,
}

impl PytestCommand {
    /// The file the probe writes per-test coverage to, inside the store directory.
    const PROBE_COVERAGE_FILE_NAME: &'static str = "probe_coverage.json";

    /// Creates a new pytest command.
    ///
    /// `pytest_args` is split using shell quoting rules and appended to every pytest invocation.
    /// Commands run in `cwd`, and write coverage data and outcomes into `store`.
    pub fn new(
        python: impl Into<String>,
        pytest_args: &str,
        cwd: impl Into<Utf8PathBuf>,
        store: Store,
    ) -> Result<Self, TestCommandError> {
        let extra_args =
            shell_words::split(pytest_args).map_err(|error| TestCommandError::ParseArgs {
                input: pytest_args.to_owned(),
                error,
            })?;
        Ok(Self {
            python: python.into(),
            extra_args,
            cwd: cwd.into(),
            store,
        })
    }

    /// Arguments to the interpreter for the full coverage run.
    fn coverage_run_args(&self, project: &Utf8Path) -> Vec<String> {
        let mut args = self.pytest_prefix();
        args.extend([
            "-q".to_owned(),
            format!("--cov={project}"),
            "--cov-context=test".to_owned(),
            "--cov-report=".to_owned(),
            "--json-report".to_owned(),
            format!("--json-report-file={}", self.store.outcomes_path()),
            project.to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Arguments to the interpreter for exporting coverage data with contexts.
    fn coverage_export_args(&self) -> Vec<String> {
        vec![
            "-m".to_owned(),
            "coverage".to_owned(),
            "json".to_owned(),
            "-o".to_owned(),
            self.store.coverage_path().to_string(),
            "--show-contexts".to_owned(),
        ]
    }

    fn run_selected_args(&self, project: &Utf8Path, test_ids: &[TestId]) -> Vec<String> {
        let mut args = self.pytest_prefix();
        args.push("-q".to_owned());
        if test_ids.is_empty() {
            args.push(project.to_string());
        } else {
            args.extend(test_ids.iter().map(|id| id.to_string()));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn collect_args(&self, project: &Utf8Path) -> Vec<String> {
        let mut args = self.pytest_prefix();
        args.extend([
            "-q".to_owned(),
            "--collect-only".to_owned(),
            project.to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn probe_args(&self, project: &Utf8Path, test_id: &TestId, report: &Utf8Path) -> Vec<String> {
        let mut args = self.pytest_prefix();
        args.extend([
            "-q".to_owned(),
            format!("--cov={project}"),
            "--cov-branch".to_owned(),
            format!("--cov-report=json:{report}"),
            test_id.to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn pytest_prefix(&self) -> Vec<String> {
        vec!["-m".to_owned(), "pytest".to_owned()]
    }

    fn display_command(&self, args: &[String]) -> String {
        shell_words::join(
            std::iter::once(self.python.as_str()).chain(args.iter().map(|arg| arg.as_str())),
        )
    }

    fn expression(&self, args: &[String]) -> duct::Expression {
        duct::cmd(self.python.as_str(), args).dir(self.cwd.as_std_path())
    }

    /// Runs the interpreter with inherited stdio and returns its exit code.
    fn run_inherited(&self, args: &[String]) -> Result<i32, TestCommandError> {
        let command = self.display_command(args);
        info!("running `{command}`");
        let output = self
            .expression(args)
            .unchecked()
            .run()
            .map_err(|error| TestCommandError::Exec {
                command: command.clone(),
                error,
            })?;
        Ok(exit_code(output.status, &command))
    }
}

impl TestCommandRunner for PytestCommand {
    fn run_with_coverage(&self, project: &Utf8Path) -> Result<CoverageRun, TestCommandError> {
        std::fs::create_dir_all(self.store.dir()).map_err(|error| {
            TestCommandError::PrepareOutput {
                path: self.store.dir().to_owned(),
                error,
            }
        })?;

        // Outputs left by an earlier run would be recorded again if this run doesn't rewrite them.
        remove_stale_output(&self.store.outcomes_path())?;
        remove_stale_output(&self.store.coverage_path())?;

        let run_args = self.coverage_run_args(project);
        let exit_code = self.run_inherited(&run_args)?;
        if !PYTEST_OK_EXIT_CODES.contains(&exit_code) {
            warn!("pytest exited with code {exit_code}, recording results anyway");
        }

        let export_args = self.coverage_export_args();
        let export_code = self.run_inherited(&export_args)?;
        if export_code != 0 {
            warn!("coverage export exited with code {export_code}");
        }

        let read_error = |error: StoreReadError| TestCommandError::ReadOutput {
            command: self.display_command(&run_args),
            error,
        };
        let coverage = self.store.load_coverage().map_err(read_error)?;
        let outcomes = self.store.load_outcomes().map_err(read_error)?;

        Ok(CoverageRun {
            exit_code,
            coverage,
            outcomes,
        })
    }

    fn run_selected(
        &self,
        project: &Utf8Path,
        test_ids: &[TestId],
    ) -> Result<i32, TestCommandError> {
        self.run_inherited(&self.run_selected_args(project, test_ids))
    }

    fn probe(&self, project: &Utf8Path) -> Result<Vec<(TestId, Vec<String>)>, TestCommandError> {
        let collect_args = self.collect_args(project);
        let command = self.display_command(&collect_args);
        debug!("collecting tests with `{command}`");
        let output = self
            .expression(&collect_args)
            .stdout_capture()
            .stderr_to_stdout()
            .unchecked()
            .run()
            .map_err(|error| TestCommandError::Exec {
                command: command.clone(),
                error,
            })?;
        let test_ids = parse_collected_ids(&String::from_utf8_lossy(&output.stdout));
        info!("probing {} tests one at a time", test_ids.len());

        let report = self.store.dir().join(Self::PROBE_COVERAGE_FILE_NAME);
        let mut results = Vec::with_capacity(test_ids.len());
        for test_id in test_ids {
            // A stale report from the previous test must not be attributed to this one.
            remove_stale_output(&report)?;

            let args = self.probe_args(project, &test_id, &report);
            let probe_command = self.display_command(&args);
            debug!("probing `{probe_command}`");
            self.expression(&args)
                .stdout_null()
                .stderr_null()
                .unchecked()
                .run()
                .map_err(|error| TestCommandError::Exec {
                    command: probe_command,
                    error,
                })?;

            let files = match read_json::<Value>(&report, StoreFileKind::Coverage) {
                Ok(data) => data
                    .get("files")
                    .and_then(Value::as_object)
                    .map(|files| files.keys().cloned().collect())
                    .unwrap_or_default(),
                Err(error) => {
                    debug!("no coverage for {test_id}: {error}");
                    Vec::new()
                }
            };
            results.push((test_id, files));
        }

        Ok(results)
    }
}

fn remove_stale_output(path: &Utf8Path) -> Result<(), TestCommandError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("removed stale output {path}");
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(TestCommandError::PrepareOutput {
            path: path.to_owned(),
            error,
        }),
    }
}

fn exit_code(status: ExitStatus, command: &str) -> i32 {
    match status.code() {
        Some(code) => code,
        None => {
            warn!("`{command}` was terminated by a signal");
            1
        }
    }
}

/// Extracts test IDs from the output of `pytest --collect-only -q`.
pub(crate) fn parse_collected_ids(output: &str) -> Vec<TestId> {
    const NOISE_PREFIXES: [&str; 7] = [
        "[", "=", "collected", "Platform", "plugins:", "ERROR", "WARNING",
    ];
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(TestId::SEPARATOR))
        .filter(|line| !NOISE_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .map(TestId::new)
        .collect()
}
