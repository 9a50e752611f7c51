// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{CommandError, SelectionSummary};
use camino::Utf8PathBuf;
use std::{ffi::OsString, process::Command};

/// Builder for an `ste select --message-format json` invocation.
///
/// This lets tooling obtain a [`SelectionSummary`] without linking against the selection engine.
#[derive(Clone, Debug, Default)]
pub struct SelectCommand {
    ste_path: Option<Utf8PathBuf>,
    current_dir: Option<Utf8PathBuf>,
    profile: Option<String>,
    changed_files: Vec<String>,
    args: Vec<String>,
}

impl SelectCommand {
    /// Creates a new `SelectCommand` which runs `ste` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path to the `ste` binary.
    pub fn ste_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.ste_path = Some(path.into());
        self
    }

    /// Sets the directory `ste` runs in. This is the project root.
    pub fn current_dir(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.current_dir = Some(path.into());
        self
    }

    /// Sets the configuration profile.
    pub fn profile(&mut self, profile: impl Into<String>) -> &mut Self {
        self.profile = Some(profile.into());
        self
    }

    /// Passes changed files explicitly instead of asking git for a diff.
    pub fn changed_files(&mut self, files: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.changed_files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Adds additional arguments to `ste select`.
    pub fn add_args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the program and arguments that will be run.
    pub fn cmd_args(&self) -> (String, Vec<OsString>) {
        let program = self
            .ste_path
            .as_ref()
            .map_or_else(|| "ste".to_owned(), |path| path.to_string());

        let mut args: Vec<OsString> = vec!["select".into(), "--message-format".into(), "json".into()];
        if let Some(profile) = &self.profile {
            args.push("--profile".into());
            args.push(profile.into());
        }
        for file in &self.changed_files {
            args.push("--changed-file".into());
            args.push(file.into());
        }
        args.extend(self.args.iter().map(OsString::from));
        (program, args)
    }

    /// Runs `ste select` and parses the selection from its standard output.
    pub fn exec(&self) -> Result<SelectionSummary, CommandError> {
        let (program, args) = self.cmd_args();
        let mut command = Command::new(&program);
        command.args(&args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .map_err(|error| CommandError::Exec { program, error })?;
        if !output.status.success() {
            return Err(CommandError::CommandFailed {
                exit_code: output.status.code(),
                stderr: output.stderr,
            });
        }

        serde_json::from_slice(&output.stdout).map_err(CommandError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_args_include_profile_and_changed_files() {
        let mut command = SelectCommand::new();
        command
            .ste_path("/usr/local/bin/ste")
            .profile("ci")
            .changed_files(["src/x.py", "src/y.py"])
            .add_args(["--budget-tests", "5"]);

        let (program, args) = command.cmd_args();
        assert_eq!(program, "/usr/local/bin/ste");
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            [
                "select",
                "--message-format",
                "json",
                "--profile",
                "ci",
                "--changed-file",
                "src/x.py",
                "--changed-file",
                "src/y.py",
                "--budget-tests",
                "5",
            ]
        );
    }

    #[test]
    fn default_program_is_ste() {
        let (program, args) = SelectCommand::new().cmd_args();
        assert_eq!(program, "ste");
        assert_eq!(args.len(), 3);
    }
}
