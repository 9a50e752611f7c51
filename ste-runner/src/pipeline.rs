// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end operations combining the engine with its collaborators.

use crate::{
    coverage_map::CoverageMaps,
    errors::TestCommandError,
    helpers::plural,
    history::History,
    test_command::{CoverageRun, TestCommandRunner},
};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Where the coverage maps recorded for a run came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoverageSource {
    /// Per-test contexts in the coverage data.
    Contexts,
    /// Running each test on its own.
    Probe,
    /// No per-test coverage was available.
    Unavailable,
}

/// A summary of a recorded run.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordSummary {
    /// The test tool's exit code.
    pub exit_code: i32,
    /// The number of tests in the run.
    pub test_count: usize,
    /// The number of failing tests in the run.
    pub failed_count: usize,
    /// The number of files in the new coverage maps.
    pub file_count: usize,
    /// Where the coverage maps came from.
    pub coverage_source: CoverageSource,
}

/// Options for [`record_run`].
#[derive(Clone, Copy, Debug)]
pub struct RecordOptions<'a> {
    /// The directory the test command ran in. Coverage paths are made relative to it.
    pub project_root: &'a Utf8Path,
    /// The tests path passed to the test command.
    pub project: &'a Utf8Path,
    /// Whether to probe tests one at a time if the coverage data has no per-test contexts.
    pub probe_fallback: bool,
    /// The time to record the run at.
    pub now: DateTime<Utc>,
}

/// Runs the test suite under coverage and folds the results into `history`.
///
/// The coverage maps are replaced wholesale, and the run's outcomes are appended to the
/// statistics. A non-zero exit code from the test tool is reported in the summary but does not
/// stop the run from being recorded.
pub fn record_run(
    history: &mut History,
    runner: &dyn TestCommandRunner,
    opts: RecordOptions<'_>,
) -> Result<RecordSummary, TestCommandError> {
    let CoverageRun {
        exit_code,
        coverage,
        outcomes,
    } = runner.run_with_coverage(opts.project)?;

    let mut maps = CoverageMaps::build(&coverage, opts.project_root);
    let mut coverage_source = CoverageSource::Contexts;
    if maps.is_empty() {
        if opts.probe_fallback {
            info!("coverage data has no per-test contexts, probing tests one at a time");
            let probed = runner.probe(opts.project)?;
            maps = CoverageMaps::from_probe(probed, opts.project_root);
            coverage_source = CoverageSource::Probe;
        } else {
            coverage_source = CoverageSource::Unavailable;
        }
        if maps.is_empty() {
            warn!("no per-test coverage found: selections will rely on history alone");
            coverage_source = CoverageSource::Unavailable;
        }
    }

    let file_count = maps.file_to_tests.len();
    history.replace_coverage(maps);
    history.record_run(&outcomes, opts.project.as_str(), opts.now);

    let summary = RecordSummary {
        exit_code,
        test_count: outcomes.len(),
        failed_count: outcomes.failed_count(),
        file_count,
        coverage_source,
    };
    info!(
        "recorded {} {} ({} {}) covering {} {}",
        summary.test_count,
        plural::tests_str(summary.test_count),
        summary.failed_count,
        plural::failures_str(summary.failed_count),
        summary.file_count,
        plural::files_str(summary.file_count),
    );
    Ok(summary)
}
