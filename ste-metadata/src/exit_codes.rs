// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `ste` failures.
///
/// `ste` invocations may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
///
/// `ste run-selected` is an exception: on a successful spawn it exits with the test command's own
/// exit code, so callers can treat it like the underlying test tool.
pub enum SteExitCode {}

impl SteExitCode {
    /// No errors occurred and `ste` exited normally.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up an `ste` invocation: invalid configuration, an
    /// unknown profile, or a missing selection file.
    pub const SETUP_ERROR: i32 = 96;

    /// The persisted history could not be read or failed validation.
    pub const HISTORY_CORRUPT: i32 = 97;

    /// Reading from or writing to the store directory failed.
    pub const STORE_ERROR: i32 = 98;

    /// The test command could not be spawned.
    pub const TEST_COMMAND_FAILED: i32 = 99;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
