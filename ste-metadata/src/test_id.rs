// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{borrow::Borrow, fmt};

/// A stable identifier for a single test case.
///
/// By convention this is a file path and a test name separated by `::`, for example
/// `tests/test_payments.py::test_refund`. The identifier is opaque to the selection engine apart
/// from that convention: it only needs to be stable across runs.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(SmolStr);

impl TestId {
    /// The separator between the file path and the test name.
    pub const SEPARATOR: &'static str = "::";

    /// Creates a new `TestId`.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the file path component, if the identifier follows the `path::name` convention.
    pub fn file_path(&self) -> Option<&str> {
        self.0.split_once(Self::SEPARATOR).map(|(path, _)| path)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TestId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "proptest1")]
mod proptest_impls {
    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for TestId {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: ()) -> Self::Strategy {
            ("[a-z]{1,4}/test_[a-z]{1,4}\\.py", "test_[a-z0-9]{1,6}")
                .prop_map(|(path, name)| TestId::new(format!("{path}::{name}")))
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tests/test_x.py::test_y", Some("tests/test_x.py"); "path and name")]
    #[test_case("tests/test_x.py::Cls::test_y", Some("tests/test_x.py"); "class method")]
    #[test_case("tests/test_x.py", None; "path only")]
    fn file_path(input: &str, expected: Option<&str>) {
        assert_eq!(TestId::new(input).file_path(), expected);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = TestId::new("a.py::b");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""a.py::b""#);
    }
}
