// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use super::{
    commands::{exec_record_run, exec_report, exec_run_selected, exec_select, exec_show_config},
    common::{BaseApp, CommonOpts, ProfileOverrides, TestCommandOpts},
};
use crate::{
    Result,
    output::{OutputContext, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::{Args, Subcommand, ValueEnum};

/// Selective test execution for pytest suites.
///
/// ste records which source files each test executes and how tests have behaved over time. After
/// a change, it picks the tests most likely to catch a regression within a test-count and time
/// budget.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    bin_name = "ste",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct SteApp {
    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl SteApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.common.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::RecordRun(opts) => {
                let base = BaseApp::new(
                    output,
                    self.common,
                    ProfileOverrides::from_test_command(opts.test_command),
                )?;
                exec_record_run(&base)
            }
            Command::Select(opts) => {
                let overrides = ProfileOverrides {
                    project: opts.project,
                    budget_tests: opts.budget_tests,
                    budget_seconds: opts.budget_seconds,
                    base: opts.base,
                    head: opts.head,
                    ..ProfileOverrides::default()
                };
                let base = BaseApp::new(output, self.common, overrides)?;
                exec_select(&base, opts.changed_files, opts.message_format, output_writer)
            }
            Command::RunSelected(opts) => {
                let explicit_project = opts.test_command.project.is_some();
                let base = BaseApp::new(
                    output,
                    self.common,
                    ProfileOverrides::from_test_command(opts.test_command),
                )?;
                exec_run_selected(&base, explicit_project)
            }
            Command::Report => {
                let base = BaseApp::new(output, self.common, ProfileOverrides::default())?;
                exec_report(&base)
            }
            Command::ShowConfig => {
                let base = BaseApp::new(output, self.common, ProfileOverrides::default())?;
                exec_show_config(&base, output_writer)
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the whole suite under coverage and record the results
    ///
    /// Rebuilds the file-to-test mappings from per-test coverage, updates per-test statistics
    /// with the run's outcomes, and rewrites the report.
    RecordRun(RecordRunOpts),

    /// Select the tests to run for the current change
    ///
    /// Finds the tests affected by the changed files, ranks every known test by risk, and picks
    /// the highest-ranked tests that fit within the budget. The selection is saved for
    /// `run-selected`, and the report is rewritten with an explanation for every test.
    Select(SelectOpts),

    /// Run the tests picked by the last `select`
    ///
    /// Exits with the test command's exit code.
    RunSelected(RunSelectedOpts),

    /// Rewrite the report from the current history
    Report,

    /// Show the resolved profile
    ShowConfig,
}

#[derive(Debug, Args)]
struct RecordRunOpts {
    #[clap(flatten)]
    test_command: TestCommandOpts,
}

#[derive(Debug, Args)]
struct RunSelectedOpts {
    #[clap(flatten)]
    test_command: TestCommandOpts,
}

#[derive(Debug, Args)]
struct SelectOpts {
    /// Path to the tests recorded with the selection.
    #[arg(long, value_name = "PATH")]
    project: Option<Utf8PathBuf>,

    /// A changed file, relative to the project root (may be repeated).
    ///
    /// When given, git is not consulted.
    #[arg(
        long = "changed-file",
        value_name = "PATH",
        conflicts_with_all = ["base", "head"],
        help_heading = "Change options"
    )]
    changed_files: Vec<String>,

    /// The base revision to diff against.
    #[arg(long, value_name = "REV", help_heading = "Change options")]
    base: Option<String>,

    /// The head revision to diff.
    #[arg(long, value_name = "REV", help_heading = "Change options")]
    head: Option<String>,

    /// The maximum number of tests to select (0 for unlimited).
    #[arg(long, value_name = "N", help_heading = "Budget options")]
    budget_tests: Option<usize>,

    /// The maximum estimated time, in seconds (0 for unlimited).
    #[arg(
        long,
        visible_alias = "budget-time-seconds",
        value_name = "SECS",
        help_heading = "Budget options"
    )]
    budget_seconds: Option<f64>,

    /// Output format.
    #[arg(
        long,
        short = 'T',
        value_enum,
        default_value_t,
        value_name = "FMT",
        help_heading = "Output options"
    )]
    message_format: MessageFormat,
}

/// Output formats for `select`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum MessageFormat {
    /// A summary and the selected test ids.
    #[default]
    Human,
    /// The saved selection, as JSON.
    Json,
}
