// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving changed files to the tests they affect.

use crate::{
    helpers::{basename, normalize_separators},
    history::History,
};
use ste_metadata::TestId;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// A normalized set of changed file paths, ready for matching against coverage map keys.
#[derive(Clone, Debug)]
pub struct ChangedFiles {
    paths: Vec<String>,
    basenames: HashSet<String>,
}

impl ChangedFiles {
    /// Normalizes a list of changed paths. Blank entries are dropped.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths
            .into_iter()
            .map(|path| normalize_separators(path.as_ref().trim()))
            .filter(|path| !path.is_empty())
            .collect();
        let basenames = paths
            .iter()
            .map(|path| basename(path))
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        Self { paths, basenames }
    }

    /// Returns true if there are no changed files.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns true if a coverage map key refers to one of the changed files.
    ///
    /// A key matches on exact equality, if it ends with `/` followed by a changed path, or if its
    /// last component equals the last component of any changed path. The basename rule matches
    /// unrelated files that share a name, so it errs towards selecting more tests.
    pub fn matches(&self, key: &str) -> bool {
        let key = normalize_separators(key);
        if self.basenames.contains(basename(&key)) {
            return true;
        }
        self.paths.iter().any(|changed| {
            key == *changed
                || key
                    .strip_suffix(changed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('/'))
        })
    }
}

/// Returns the set of tests affected by the changed files.
///
/// Both directions of the coverage maps are consulted, so a test is found even if only one of
/// them mentions it.
pub fn affected_tests(history: &History, changed: &ChangedFiles) -> BTreeSet<TestId> {
    let mut affected = BTreeSet::new();
    if changed.is_empty() {
        return affected;
    }

    for (file, tests) in &history.coverage_map {
        if changed.matches(file) {
            affected.extend(tests.iter().cloned());
        }
    }

    for (test_id, files) in &history.test_to_files {
        if !affected.contains(test_id) && files.iter().any(|file| changed.matches(file)) {
            affected.insert(test_id.clone());
        }
    }

    debug!(
        affected = affected.len(),
        changed = changed.paths.len(),
        "resolved affected tests"
    );
    affected
}
