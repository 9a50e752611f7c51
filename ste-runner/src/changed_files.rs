// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asking git which files changed between two revisions.

use crate::errors::ChangedFilesError;
use camino::Utf8Path;
use tracing::debug;

/// Returns the files changed between `base` and `head`, as reported by
/// `git diff --name-only <base>..<head>` run in `repo`.
pub fn git_changed_files(
    repo: &Utf8Path,
    base: &str,
    head: &str,
) -> Result<Vec<String>, ChangedFilesError> {
    let range = format!("{base}..{head}");
    let command = format!("git diff --name-only {range}");
    debug!("running `{command}` in {repo}");

    let output = duct::cmd!("git", "diff", "--name-only", &range)
        .dir(repo.as_std_path())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|error| ChangedFilesError::Exec {
            command: command.clone(),
            error,
        })?;

    if !output.status.success() {
        return Err(ChangedFilesError::Failed {
            command,
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    Ok(parse_name_only(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_name_only(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}
