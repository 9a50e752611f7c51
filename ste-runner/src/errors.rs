// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by ste.
//!
//! The selection engine itself never fails: missing or malformed coverage and outcome data
//! degrade to empty inputs. The errors here cover caller misuse (invalid configuration) and the
//! collaborators around the engine (the store, the test command and git).

use camino::Utf8PathBuf;
use config::ConfigError;
use std::fmt;
use thiserror::Error;

/// An error that occurred while loading the config.
#[derive(Debug, Error)]
#[error("failed to parse ste config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    ///
    /// For errors in environment overrides, this is still the repository config file path.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while loading the config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The TOML could not be read, or didn't match the expected schema.
    #[error("error building config")]
    BuildError(#[source] Box<ConfigError>),

    /// The config parsed but contains a value that is not allowed.
    #[error(transparent)]
    InvalidValue(InvalidConfigError),
}

/// An error which indicates that a profile was requested but not known to ste.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// A configuration value that parsed correctly but is not allowed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvalidConfigError {
    /// A budget was negative.
    #[error("in profile `{profile}`, `{key}` must not be negative (found {value})")]
    NegativeBudget {
        /// The profile containing the budget.
        profile: String,
        /// The budget key, e.g. `budget-tests`.
        key: &'static str,
        /// The value that was found.
        value: f64,
    },

    /// A scoring weight was negative or not a finite number.
    #[error("in profile `{profile}`, weight `{key}` must be a finite, non-negative number (found {value})")]
    InvalidWeight {
        /// The profile containing the weight.
        profile: String,
        /// The weight key, e.g. `fail-rate`.
        key: &'static str,
        /// The value that was found.
        value: f64,
    },
}

/// An error that occurs while loading the persisted history.
#[derive(Debug, Error)]
pub enum HistoryLoadError {
    /// Error reading the history file.
    #[error("failed to read history file at {path}")]
    Read {
        /// The path that failed to be read.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Error deserializing the history.
    #[error("failed to deserialize history at {path}")]
    Deserialize {
        /// The path that failed to be deserialized.
        path: Utf8PathBuf,
        /// The underlying deserialization error.
        #[source]
        error: serde_json::Error,
    },

    /// The history deserialized, but contains impossible statistics.
    #[error("history at {path} is corrupt")]
    Invalid {
        /// The path containing the invalid history.
        path: Utf8PathBuf,
        /// What was wrong with it.
        #[source]
        violation: HistoryViolation,
    },
}

/// A statistic in a loaded history that can't have been produced by recording runs.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum HistoryViolation {
    /// A test has more failures than runs.
    #[error("test `{test_id}` has {fails} failures but only {runs} runs")]
    FailsExceedRuns {
        /// The test ID.
        test_id: String,
        /// The number of recorded runs.
        runs: u64,
        /// The number of recorded failures.
        fails: u64,
    },

    /// A test has a negative or non-finite average duration.
    #[error("test `{test_id}` has invalid average duration {avg_duration}")]
    InvalidDuration {
        /// The test ID.
        test_id: String,
        /// The average duration found.
        avg_duration: f64,
    },
}

/// An error that occurs while reading a file from the store directory.
#[derive(Debug, Error)]
pub enum StoreReadError {
    /// The file does not exist.
    #[error("{kind} not found at {path}")]
    NotFound {
        /// The kind of file.
        kind: StoreFileKind,
        /// The path that was looked up.
        path: Utf8PathBuf,
    },

    /// Error reading the file.
    #[error("failed to read {kind} at {path}")]
    Read {
        /// The kind of file.
        kind: StoreFileKind,
        /// The path that failed to be read.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Error deserializing the file.
    #[error("failed to deserialize {kind} at {path}")]
    Deserialize {
        /// The kind of file.
        kind: StoreFileKind,
        /// The path that failed to be deserialized.
        path: Utf8PathBuf,
        /// The underlying deserialization error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurs while writing a file to the store or report directory.
#[derive(Debug, Error)]
pub enum StoreWriteError {
    /// Error creating the directory.
    #[error("failed to create directory {path}")]
    CreateDir {
        /// The directory path that failed to be created.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Error serializing the contents.
    #[error("failed to serialize {kind}")]
    Serialize {
        /// The kind of file.
        kind: StoreFileKind,
        /// The underlying serialization error.
        #[source]
        error: serde_json::Error,
    },

    /// Error writing the file to disk.
    #[error("failed to write {kind} to {path}")]
    Write {
        /// The kind of file.
        kind: StoreFileKind,
        /// The path that failed to be written.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },
}

/// The kinds of files kept by ste.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreFileKind {
    /// `history.json`.
    History,
    /// `coverage.json`, exported by the coverage tool.
    Coverage,
    /// The raw run outcomes written by the test command.
    Outcomes,
    /// `selection.json`.
    Selection,
    /// `latest.json` in the report directory.
    Report,
}

impl fmt::Display for StoreFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::History => write!(f, "history"),
            Self::Coverage => write!(f, "coverage data"),
            Self::Outcomes => write!(f, "run outcomes"),
            Self::Selection => write!(f, "selection"),
            Self::Report => write!(f, "report"),
        }
    }
}

/// An error that occurs while running the test command.
#[derive(Debug, Error)]
pub enum TestCommandError {
    /// The extra arguments could not be split into words.
    #[error("failed to parse test command arguments `{input}`")]
    ParseArgs {
        /// The input that failed to parse.
        input: String,
        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },

    /// The test command could not be spawned.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command that was run.
        command: String,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An output location for the test command could not be prepared.
    #[error("failed to prepare output path {path}")]
    PrepareOutput {
        /// The path being prepared.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// A file produced by the test command could not be read.
    #[error("failed to read output of `{command}`")]
    ReadOutput {
        /// The command that was run.
        command: String,
        /// The underlying error.
        #[source]
        error: StoreReadError,
    },
}

/// An error that occurs while asking git for changed files.
#[derive(Debug, Error)]
pub enum ChangedFilesError {
    /// git could not be spawned.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command that was run.
        command: String,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// git exited with a non-zero code.
    #[error("`{command}` failed{}: {stderr}", .exit_code.map_or(String::new(), |code| format!(" with exit code {code}")))]
    Failed {
        /// The command that was run.
        command: String,
        /// The exit code, if any.
        exit_code: Option<i32>,
        /// Standard error, lossily decoded.
        stderr: String,
    },
}
