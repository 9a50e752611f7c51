// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while invoking `ste select` through [`SelectCommand`](crate::SelectCommand).
#[derive(Debug)]
pub enum CommandError {
    /// The `ste` process could not be spawned.
    Exec {
        /// The program that was invoked.
        program: String,

        /// The underlying error.
        error: std::io::Error,
    },

    /// `ste select` exited with a non-zero code.
    CommandFailed {
        /// The exit code for the process. Exit codes can be cross-referenced against
        /// [`SteExitCode`](crate::SteExitCode).
        exit_code: Option<i32>,

        /// Standard error for the process.
        stderr: Vec<u8>,
    },

    /// The selection printed to standard output was not valid JSON.
    Json(serde_json::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exec { program, .. } => {
                write!(f, "failed to execute `{program} select`")
            }
            Self::CommandFailed { exit_code, stderr } => {
                let exit_code_str =
                    exit_code.map_or(String::new(), |code| format!(" with exit code {code}"));
                let stderr = String::from_utf8_lossy(stderr);
                write!(f, "`ste select` failed{exit_code_str}, stderr:\n{stderr}\n")
            }
            Self::Json(_) => {
                write!(f, "`ste select` produced a selection that could not be parsed")
            }
        }
    }
}

impl error::Error for CommandError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Exec { error, .. } => Some(error),
            Self::CommandFailed { .. } => None,
            Self::Json(err) => Some(err),
        }
    }
}
