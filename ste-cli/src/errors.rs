// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, Styles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use ste_metadata::SteExitCode;
use ste_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure: bad input or an environment problem, as opposed to a bug in ste.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid command-line override")]
    InvalidOverride {
        #[source]
        err: InvalidConfigError,
    },
    #[error("history load error")]
    HistoryLoadError {
        #[from]
        err: HistoryLoadError,
    },
    #[error("selection not found")]
    SelectionNotFound { path: Utf8PathBuf },
    #[error("store read error")]
    StoreReadError {
        #[source]
        err: StoreReadError,
    },
    #[error("store write error")]
    StoreWriteError {
        #[from]
        err: StoreWriteError,
    },
    #[error("test command error")]
    TestCommandError {
        #[from]
        err: TestCommandError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn store_read_error(err: StoreReadError) -> Self {
        match err {
            StoreReadError::NotFound {
                kind: StoreFileKind::Selection,
                path,
            } => Self::SelectionNotFound { path },
            err => Self::StoreReadError { err },
        }
    }

    pub(crate) fn write_output(err: impl Into<std::io::Error>) -> Self {
        Self::WriteOutputError { err: err.into() }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::ProfileNotFound { .. }
            | Self::ConfigParseError { .. }
            | Self::InvalidOverride { .. }
            | Self::SelectionNotFound { .. } => SteExitCode::SETUP_ERROR,
            Self::TestCommandError {
                err: TestCommandError::ParseArgs { .. },
            } => SteExitCode::SETUP_ERROR,
            Self::HistoryLoadError { .. } => SteExitCode::HISTORY_CORRUPT,
            Self::StoreReadError { .. } | Self::StoreWriteError { .. } => SteExitCode::STORE_ERROR,
            Self::TestCommandError { .. } => SteExitCode::TEST_COMMAND_FAILED,
            Self::WriteOutputError { .. } => SteExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &Styles) {
        let mut next_error = match &self {
            Self::CurrentDirInvalid { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                error!("{err}");
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse ste config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::InvalidOverride { err } => {
                error!("invalid value on the command line");
                Some(err as &dyn Error)
            }
            Self::HistoryLoadError { err } => {
                error!("failed to load test history");
                Some(err as &dyn Error)
            }
            Self::SelectionNotFound { path } => {
                error!(
                    "no selection found at `{}`: run `{}` first",
                    path.style(styles.bold),
                    "ste select".style(styles.bold),
                );
                None
            }
            Self::StoreReadError { err } => {
                error!("failed to read from the store");
                Some(err as &dyn Error)
            }
            Self::StoreWriteError { err } => {
                error!("failed to write to the store");
                Some(err as &dyn Error)
            }
            Self::TestCommandError { err } => {
                error!("failed to run the test command");
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_selection_is_a_setup_error() {
        let err = ExpectedError::store_read_error(StoreReadError::NotFound {
            kind: StoreFileKind::Selection,
            path: "state/selection.json".into(),
        });
        assert!(
            matches!(&err, ExpectedError::SelectionNotFound { path } if path == "state/selection.json"),
            "unexpected error: {err:?}"
        );
        assert_eq!(err.process_exit_code(), SteExitCode::SETUP_ERROR);
    }

    #[test]
    fn other_missing_files_are_store_errors() {
        let err = ExpectedError::store_read_error(StoreReadError::NotFound {
            kind: StoreFileKind::Report,
            path: "web/data/latest.json".into(),
        });
        assert_eq!(err.process_exit_code(), SteExitCode::STORE_ERROR);
    }

    #[test]
    fn pytest_args_errors_are_setup_errors() {
        let err: ExpectedError = ste_runner::test_command::PytestCommand::new(
            "python",
            "--tb='short",
            ".",
            ste_runner::store::Store::new("state"),
        )
        .unwrap_err()
        .into();
        assert_eq!(err.process_exit_code(), SteExitCode::SETUP_ERROR);
    }
}
