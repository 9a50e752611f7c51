// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for ste, a selective test execution tool for pytest suites.
//!
//! ste keeps a history of test runs and of which source files each test executes. After a
//! change, it ranks every known test by risk and picks the highest-ranked ones that fit within a
//! test-count and time budget, explaining every decision.
//!
//! The engine is made up of:
//!
//! * [`coverage_map`]: turns raw coverage data into file-to-test mappings.
//! * [`history`]: per-test statistics accumulated across runs.
//! * [`impact`]: finds the tests affected by a set of changed files.
//! * [`scoring`]: computes weighted risk scores.
//! * [`selector`]: orders tests and admits them under budgets.
//!
//! None of these perform I/O. The [`store`], [`report`], [`test_command`] and [`changed_files`]
//! modules handle files and processes, and [`pipeline`] ties them together.

pub mod changed_files;
pub mod config;
pub mod coverage_map;
pub mod errors;
mod helpers;
pub mod history;
pub mod impact;
pub mod outcomes;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod test_command;

pub use helpers::plural;
