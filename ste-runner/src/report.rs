// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Writing the dashboard report.

use crate::{
    errors::{StoreFileKind, StoreWriteError},
    history::History,
    store::write_json_atomic,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use ste_metadata::{ExplanationSummary, ReportSummary, SelectionSummary, TestId};
use std::collections::BTreeMap;
use tracing::info;

/// Writes `latest.json` into the report directory.
#[derive(Clone, Debug)]
pub struct ReportWriter {
    dir: Utf8PathBuf,
}

impl ReportWriter {
    /// The name of the report file.
    pub const REPORT_FILE_NAME: &'static str = "latest.json";

    /// Creates a writer for the given report directory.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the path of the report file.
    pub fn report_path(&self) -> Utf8PathBuf {
        self.dir.join(Self::REPORT_FILE_NAME)
    }

    /// Writes a report for the current history, with the selection and explanations if this
    /// follows a selection.
    ///
    /// Returns the path written to.
    pub fn write(
        &self,
        history: &History,
        selection: Option<&SelectionSummary>,
        explanations: BTreeMap<TestId, ExplanationSummary>,
        generated_at: DateTime<Utc>,
    ) -> Result<Utf8PathBuf, StoreWriteError> {
        let history = serde_json::to_value(history).map_err(|error| StoreWriteError::Serialize {
            kind: StoreFileKind::History,
            error,
        })?;
        let report = ReportSummary {
            generated_at: generated_at.timestamp(),
            selection: selection.cloned(),
            explanations,
            history,
        };

        let path = self.report_path();
        write_json_atomic(&path, StoreFileKind::Report, &report)?;
        info!("wrote report to {path}");
        Ok(path)
    }

    /// Returns the report directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ste_metadata::{SelectionReason, WeightsSummary};

    #[test]
    fn writes_latest_json() {
        let dir = camino_tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("web/data"));
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let explanations = BTreeMap::from([(
            TestId::new("t.py::a"),
            ExplanationSummary {
                affected: true,
                fail_rate: 0.0,
                flaky_rate: 0.0,
                runtime_norm: 0.0,
                weights: WeightsSummary {
                    affected: 1.0,
                    fail_rate: 0.5,
                    flaky_rate: 0.2,
                    runtime: 0.1,
                },
                score: 1.0,
                included: true,
                reason: SelectionReason::Affected,
            },
        )]);
        let path = writer
            .write(&History::new(), None, explanations, now)
            .unwrap();
        assert_eq!(path, dir.path().join("web/data/latest.json"));

        let written: ReportSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.generated_at, now.timestamp());
        assert_eq!(written.selection, None);
        assert_eq!(written.explanations.len(), 1);
        assert_eq!(written.history["tests"], serde_json::json!({}));
    }
}
