// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable output for `ste`, the selective test execution tool.
//!
//! `ste select` ranks known tests by risk, admits them under a test-count and time budget, and
//! writes a [`SelectionSummary`] plus one [`ExplanationSummary`] per test. These types are stable
//! so that dashboards and CI scripts can consume them without depending on the selection engine.
//!
//! To run a selection from another tool, use [`SelectCommand`].

mod command;
mod errors;
mod exit_codes;
mod selection;
mod test_id;

pub use command::*;
pub use errors::*;
pub use exit_codes::*;
pub use selection::*;
pub use test_id::*;
