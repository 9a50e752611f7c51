// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Options and setup shared by every subcommand.

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use ste_runner::{
    config::{SteConfig, SteProfile},
    report::ReportWriter,
    store::Store,
    test_command::PytestCommand,
};

/// Options shared between all subcommands.
#[derive(Debug, Args)]
pub(crate) struct CommonOpts {
    /// Project root [default: current directory].
    ///
    /// Coverage paths, the store and report directories, and `git diff` are all relative to this
    /// directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub(crate) root: Option<Utf8PathBuf>,

    #[clap(flatten)]
    pub(crate) output: OutputOpts,

    #[clap(flatten)]
    pub(crate) config_opts: ConfigOpts,
}

/// Configuration options for ste.
#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
pub(crate) struct ConfigOpts {
    /// Config file [default: project-root/.config/ste.toml].
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config_file: Option<Utf8PathBuf>,

    /// The ste profile to use.
    ///
    /// Profiles set budgets, scoring weights and test command options. Every profile inherits
    /// unset values from the `default` profile.
    #[arg(long, short = 'P', env = "STE_PROFILE", global = true)]
    pub(crate) profile: Option<String>,
}

impl ConfigOpts {
    /// Creates an ste config with the given options.
    pub(crate) fn make_config(&self, project_root: &Utf8Path) -> Result<SteConfig> {
        Ok(SteConfig::from_sources(
            project_root,
            self.config_file.as_deref(),
            std::env::vars(),
        )?)
    }
}

/// Options for the test command, accepted by subcommands that run tests.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Test command options")]
pub(crate) struct TestCommandOpts {
    /// Path to the tests, relative to the project root.
    #[arg(long, value_name = "PATH")]
    pub(crate) project: Option<Utf8PathBuf>,

    /// Extra arguments for pytest, split with shell quoting rules.
    #[arg(long, visible_alias = "pytest-opts", value_name = "ARGS", allow_hyphen_values = true)]
    pub(crate) pytest_args: Option<String>,
}

/// Values given on the command line that replace those in the resolved profile.
#[derive(Debug, Default)]
pub(crate) struct ProfileOverrides {
    pub(crate) project: Option<Utf8PathBuf>,
    pub(crate) pytest_args: Option<String>,
    pub(crate) budget_tests: Option<usize>,
    pub(crate) budget_seconds: Option<f64>,
    pub(crate) base: Option<String>,
    pub(crate) head: Option<String>,
}

impl ProfileOverrides {
    pub(crate) fn from_test_command(opts: TestCommandOpts) -> Self {
        Self {
            project: opts.project,
            pytest_args: opts.pytest_args,
            ..Self::default()
        }
    }

    fn apply(self, profile: &mut SteProfile) {
        if let Some(project) = self.project {
            profile.project = project;
        }
        if let Some(pytest_args) = self.pytest_args {
            profile.pytest_args = pytest_args;
        }
        if let Some(budget_tests) = self.budget_tests {
            profile.budget_tests = i64::try_from(budget_tests).unwrap_or(i64::MAX);
        }
        if let Some(budget_seconds) = self.budget_seconds {
            profile.budget_seconds = budget_seconds;
        }
        if let Some(base) = self.base {
            profile.base = base;
        }
        if let Some(head) = self.head {
            profile.head = head;
        }
    }
}

/// The project root, resolved profile and store shared by every subcommand.
#[derive(Debug)]
pub(crate) struct BaseApp {
    pub(crate) output: OutputContext,
    pub(crate) project_root: Utf8PathBuf,
    pub(crate) profile: SteProfile,
    pub(crate) store: Store,
    pub(crate) report_writer: ReportWriter,
}

impl BaseApp {
    pub(crate) fn new(
        output: OutputContext,
        common: CommonOpts,
        overrides: ProfileOverrides,
    ) -> Result<Self> {
        let current_dir = std::env::current_dir()
            .map_err(|err| ExpectedError::CurrentDirInvalid { err })
            .and_then(|dir| {
                Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalid {
                    err: err.into_io_error(),
                })
            })?;
        // Joining an absolute path replaces the base.
        let project_root = match common.root {
            Some(root) => current_dir.join(root),
            None => current_dir,
        };

        let config = common.config_opts.make_config(&project_root)?;
        let profile_name = common
            .config_opts
            .profile
            .as_deref()
            .unwrap_or(SteConfig::DEFAULT_PROFILE);
        let mut profile = config.profile(profile_name)?;
        overrides.apply(&mut profile);
        profile
            .validate()
            .map_err(|err| ExpectedError::InvalidOverride { err })?;

        let store = Store::new(profile.store_dir.clone());
        let report_writer = ReportWriter::new(profile.report_dir.clone());

        Ok(Self {
            output,
            project_root,
            profile,
            store,
            report_writer,
        })
    }

    /// Returns the pytest command configured by the profile.
    pub(crate) fn pytest_command(&self) -> Result<PytestCommand> {
        Ok(PytestCommand::new(
            &self.profile.python,
            &self.profile.pytest_args,
            &self.project_root,
            self.store.clone(),
        )?)
    }
}
