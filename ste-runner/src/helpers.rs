// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }

    /// Returns "failure" if `count` is 1, otherwise "failures".
    pub fn failures_str(count: usize) -> &'static str {
        if count == 1 { "failure" } else { "failures" }
    }
}

/// Converts all path separators to forward slashes, so that Windows- and Unix-style paths compare
/// equal.
pub(crate) fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Returns the last component of a forward-slash separated path.
pub(crate) fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Converts a path reported by the coverage tool into the canonical form used as a coverage map
/// key.
///
/// Absolute paths are made relative to `project_root`. Paths that are already relative, or that
/// can't be expressed relative to the root, are kept as they are. Separators are always
/// normalized to `/`.
pub(crate) fn normalize_coverage_path(path: &str, project_root: &Utf8Path) -> String {
    let unified = normalize_separators(path);
    let candidate = Utf8Path::new(&unified);

    let rel = if candidate.is_absolute() {
        match pathdiff::diff_utf8_paths(candidate, project_root) {
            Some(rel) if !rel.as_str().is_empty() => normalize_separators(rel.as_str()),
            _ => unified.clone(),
        }
    } else {
        unified.clone()
    };

    match rel.strip_prefix("./") {
        Some(stripped) if !stripped.is_empty() => stripped.to_owned(),
        _ => rel,
    }
}

/// Rounds `value` to the given number of decimal places, for display.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("src/x.py", "x.py"; "nested")]
    #[test_case("x.py", "x.py"; "bare")]
    #[test_case("a/b/", ""; "trailing slash")]
    fn basename_cases(input: &str, expected: &str) {
        assert_eq!(basename(input), expected);
    }

    #[test_case("/repo/src/x.py", "/repo", "src/x.py"; "absolute under root")]
    #[test_case("src/x.py", "/repo", "src/x.py"; "already relative")]
    #[test_case("./src/x.py", "/repo", "src/x.py"; "dot relative")]
    #[test_case("src\\pkg\\x.py", "/repo", "src/pkg/x.py"; "windows separators")]
    #[test_case("/elsewhere/y.py", "/repo", "../elsewhere/y.py"; "absolute outside root")]
    fn normalize_coverage_path_cases(input: &str, root: &str, expected: &str) {
        assert_eq!(normalize_coverage_path(input, Utf8Path::new(root)), expected);
    }

    #[test_case(0.12345, 3, 0.123; "down")]
    #[test_case(0.98768, 4, 0.9877; "up")]
    #[test_case(1.0, 3, 1.0; "exact")]
    fn round_to_cases(value: f64, places: i32, expected: f64) {
        assert_eq!(round_to(value, places), expected);
    }
}
