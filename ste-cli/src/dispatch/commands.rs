// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.

use super::{app::MessageFormat, common::BaseApp};
use crate::{ExpectedError, Result, output::OutputWriter};
use chrono::Utc;
use itertools::Itertools;
use owo_colors::OwoColorize;
use std::{collections::BTreeMap, io::Write};
use ste_metadata::{SelectionSummary, SteExitCode};
use ste_runner::{
    changed_files::git_changed_files,
    impact::ChangedFiles,
    pipeline::{CoverageSource, RecordOptions, record_run},
    plural,
    selector::select_tests,
    test_command::TestCommandRunner,
};
use swrite::{SWrite, swriteln};
use tracing::{info, warn};

/// The number of selected test ids printed without `--verbose`.
const DISPLAY_LIMIT: usize = 10;

pub(crate) fn exec_record_run(base: &BaseApp) -> Result<i32> {
    let mut history = base.store.load_history()?;
    let runner = base.pytest_command()?;
    let now = Utc::now();

    let summary = record_run(
        &mut history,
        &runner,
        RecordOptions {
            project_root: &base.project_root,
            project: &base.profile.project,
            probe_fallback: base.profile.probe_fallback,
            now,
        },
    )?;
    if summary.coverage_source == CoverageSource::Unavailable && !base.profile.probe_fallback {
        info!("enable `probe-fallback` to collect per-test coverage one test at a time");
    }

    base.store.save_history(&history)?;
    base.report_writer
        .write(&history, None, BTreeMap::new(), now)?;
    info!("recorded run, updated coverage maps and history");
    Ok(SteExitCode::OK)
}

pub(crate) fn exec_select(
    base: &BaseApp,
    changed_files: Vec<String>,
    message_format: MessageFormat,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let history = base.store.load_history()?;
    if history.is_empty() {
        warn!(
            "no history found in {}: run `ste record-run` first",
            base.store.dir()
        );
    }

    let (changed_files, diff_base, diff_head) = if changed_files.is_empty() {
        let profile = &base.profile;
        let files = match git_changed_files(&base.project_root, &profile.base, &profile.head) {
            Ok(files) => files,
            Err(err) => {
                warn!("{err}; ranking tests by history alone");
                Vec::new()
            }
        };
        (files, Some(profile.base.clone()), Some(profile.head.clone()))
    } else {
        (changed_files, None, None)
    };

    let outcome = select_tests(
        &history,
        &ChangedFiles::new(&changed_files),
        &base.profile.weights,
        &base.profile.budget(),
    );

    let selection = SelectionSummary {
        profile: base.profile.name.clone(),
        project: base.profile.project.clone(),
        base: diff_base,
        head: diff_head,
        changed_files,
        selected: outcome.selected.clone(),
        budget_tests: usize::try_from(base.profile.budget_tests).unwrap_or(0),
        budget_seconds: base.profile.budget_seconds,
        estimated_seconds: outcome.elapsed,
    };
    base.store.save_selection(&selection)?;
    base.report_writer.write(
        &history,
        Some(&selection),
        outcome.explanation_summaries(),
        Utc::now(),
    )?;

    let mut writer = output_writer.stdout_writer();
    match message_format {
        MessageFormat::Human => {
            let limit = if base.output.verbose {
                usize::MAX
            } else {
                DISPLAY_LIMIT
            };
            write_selection_human(base, &selection, limit, &mut writer)
        }
        MessageFormat::Json => serde_json::to_writer_pretty(&mut writer, &selection)
            .map_err(ExpectedError::write_output)
            .and_then(|()| writeln!(writer).map_err(ExpectedError::write_output)),
    }?;
    writer.flush().map_err(ExpectedError::write_output)?;

    Ok(SteExitCode::OK)
}

fn write_selection_human(
    base: &BaseApp,
    selection: &SelectionSummary,
    limit: usize,
    writer: &mut dyn Write,
) -> Result<()> {
    let styles = base.output.stdout_styles();
    let count = selection.selected.len();
    let changed = selection.changed_files.len();

    let mut out = String::new();
    swriteln!(
        out,
        "selected {} {} for {} changed {} (estimated {:.2}s)",
        count.style(styles.bold),
        plural::tests_str(count),
        changed.style(styles.bold),
        plural::files_str(changed),
        selection.estimated_seconds,
    );
    for test_id in selection.selected.iter().take(limit) {
        swriteln!(out, "  - {}", test_id.style(styles.test_id));
    }
    if count > limit {
        swriteln!(out, "  ... and {} more", count - limit);
    }

    writer
        .write_all(out.as_bytes())
        .map_err(ExpectedError::write_output)
}

pub(crate) fn exec_run_selected(base: &BaseApp, explicit_project: bool) -> Result<i32> {
    let selection = base
        .store
        .load_selection()
        .map_err(ExpectedError::store_read_error)?;
    if selection.selected.is_empty() {
        warn!("the last selection is empty, running every test");
    }

    let project = if explicit_project {
        &base.profile.project
    } else {
        &selection.project
    };
    let runner = base.pytest_command()?;
    Ok(runner.run_selected(project, &selection.selected)?)
}

pub(crate) fn exec_report(base: &BaseApp) -> Result<i32> {
    let history = base.store.load_history()?;
    base.report_writer
        .write(&history, None, BTreeMap::new(), Utc::now())?;
    Ok(SteExitCode::OK)
}

pub(crate) fn exec_show_config(base: &BaseApp, output_writer: &mut OutputWriter) -> Result<i32> {
    let styles = base.output.stdout_styles();
    let profile = &base.profile;

    let limit_str = |value: String, is_unlimited: bool| {
        if is_unlimited {
            "unlimited".to_owned()
        } else {
            value
        }
    };

    let mut out = String::new();
    swriteln!(out, "profile: {}", profile.name.style(styles.bold));
    swriteln!(out, "project root: {}", base.project_root);
    swriteln!(out, "store: {}", profile.store_dir);
    swriteln!(out, "report: {}", profile.report_dir);
    swriteln!(out, "tests: {}", profile.project);
    swriteln!(out, "python: {}", profile.python);
    swriteln!(
        out,
        "pytest args: {}",
        if profile.pytest_args.is_empty() {
            "(none)"
        } else {
            &profile.pytest_args
        }
    );
    swriteln!(out, "probe fallback: {}", profile.probe_fallback);
    swriteln!(
        out,
        "budget: {} tests, {} seconds",
        limit_str(profile.budget_tests.to_string(), profile.budget_tests == 0),
        limit_str(profile.budget_seconds.to_string(), profile.budget_seconds == 0.0),
    );
    swriteln!(out, "diff: {}..{}", profile.base, profile.head);
    swriteln!(
        out,
        "weights: {}",
        profile
            .weights
            .entries()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .join(", ")
    );

    let mut writer = output_writer.stdout_writer();
    writer
        .write_all(out.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(ExpectedError::write_output)?;
    Ok(SteExitCode::OK)
}
