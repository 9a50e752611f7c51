// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and writing the files kept in the store directory.

use crate::{
    errors::{HistoryLoadError, StoreFileKind, StoreReadError, StoreWriteError},
    history::History,
    outcomes::RunOutcomes,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;
use std::{fs, io, io::Write};
use ste_metadata::SelectionSummary;
use tracing::{debug, warn};

/// The store directory: history, raw coverage data, raw run outcomes and the latest selection.
#[derive(Clone, Debug)]
pub struct Store {
    dir: Utf8PathBuf,
}

impl Store {
    /// The accumulated history.
    pub const HISTORY_FILE_NAME: &'static str = "history.json";

    /// Coverage data exported by the coverage tool.
    pub const COVERAGE_FILE_NAME: &'static str = "coverage.json";

    /// Run outcomes written by the test command.
    pub const OUTCOMES_FILE_NAME: &'static str = "last_pytest_report.json";

    /// The most recent selection.
    pub const SELECTION_FILE_NAME: &'static str = "selection.json";

    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the path to the history file.
    pub fn history_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::HISTORY_FILE_NAME)
    }

    /// Returns the path the coverage tool exports to.
    pub fn coverage_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::COVERAGE_FILE_NAME)
    }

    /// Returns the path the test command writes run outcomes to.
    pub fn outcomes_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::OUTCOMES_FILE_NAME)
    }

    /// Returns the path to the selection file.
    pub fn selection_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::SELECTION_FILE_NAME)
    }

    /// Loads the history. A missing history file is an empty history.
    pub fn load_history(&self) -> Result<History, HistoryLoadError> {
        let path = self.history_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("no history at {path}, starting from scratch");
                return Ok(History::new());
            }
            Err(error) => return Err(HistoryLoadError::Read { path, error }),
        };

        let history: History = match serde_json::from_str(&contents) {
            Ok(history) => history,
            Err(error) => return Err(HistoryLoadError::Deserialize { path, error }),
        };
        if let Err(violation) = history.validate() {
            return Err(HistoryLoadError::Invalid { path, violation });
        }

        debug!(tests = history.tests.len(), "loaded history from {path}");
        Ok(history)
    }

    /// Saves the history, replacing any existing file.
    pub fn save_history(&self, history: &History) -> Result<(), StoreWriteError> {
        write_json_atomic(&self.history_path(), StoreFileKind::History, history)
    }

    /// Loads the raw coverage data.
    ///
    /// A missing or unparseable file is [`Value::Null`], which builds empty coverage maps.
    pub fn load_coverage(&self) -> Result<Value, StoreReadError> {
        self.load_tolerant(&self.coverage_path(), StoreFileKind::Coverage)
    }

    /// Loads run outcomes written by the test command. A missing or unparseable file is empty.
    pub fn load_outcomes(&self) -> Result<RunOutcomes, StoreReadError> {
        let value = self.load_tolerant(&self.outcomes_path(), StoreFileKind::Outcomes)?;
        Ok(RunOutcomes::from_json_value(&value))
    }

    fn load_tolerant(&self, path: &Utf8Path, kind: StoreFileKind) -> Result<Value, StoreReadError> {
        match read_json::<Value>(path, kind) {
            Ok(value) => Ok(value),
            Err(StoreReadError::NotFound { .. }) => {
                warn!("{kind} not found at {path}, treating as empty");
                Ok(Value::Null)
            }
            Err(StoreReadError::Deserialize { error, .. }) => {
                warn!("{kind} at {path} is not valid JSON ({error}), treating as empty");
                Ok(Value::Null)
            }
            Err(other) => Err(other),
        }
    }

    /// Saves a selection, replacing any existing one.
    pub fn save_selection(&self, selection: &SelectionSummary) -> Result<(), StoreWriteError> {
        write_json_atomic(&self.selection_path(), StoreFileKind::Selection, selection)
    }

    /// Loads the most recent selection.
    ///
    /// Unlike the other inputs, a missing selection is an error: there is nothing to run.
    pub fn load_selection(&self) -> Result<SelectionSummary, StoreReadError> {
        read_json(&self.selection_path(), StoreFileKind::Selection)
    }
}

pub(crate) fn read_json<T>(path: &Utf8Path, kind: StoreFileKind) -> Result<T, StoreReadError>
where
    T: serde::de::DeserializeOwned,
{
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(StoreReadError::NotFound {
                kind,
                path: path.to_owned(),
            });
        }
        Err(error) => {
            return Err(StoreReadError::Read {
                kind,
                path: path.to_owned(),
                error,
            });
        }
    };
    serde_json::from_str(&contents).map_err(|error| StoreReadError::Deserialize {
        kind,
        path: path.to_owned(),
        error,
    })
}

/// Writes `value` as pretty-printed JSON, creating parent directories and replacing the file
/// atomically.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Utf8Path,
    kind: StoreFileKind,
    value: &T,
) -> Result<(), StoreWriteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| StoreWriteError::CreateDir {
            path: parent.to_owned(),
            error,
        })?;
    }

    let mut contents = serde_json::to_string_pretty(value)
        .map_err(|error| StoreWriteError::Serialize { kind, error })?;
    contents.push('\n');

    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| file.write_all(contents.as_bytes()))
        .map_err(|error| StoreWriteError::Write {
            kind,
            path: path.to_owned(),
            error: match error {
                atomicwrites::Error::Internal(error) | atomicwrites::Error::User(error) => error,
            },
        })?;

    debug!("wrote {kind} to {path}");
    Ok(())
}
