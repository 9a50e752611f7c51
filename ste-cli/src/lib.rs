// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selective test execution for pytest suites.
//!
//! `ste` records per-test coverage and run history, then picks the tests most likely to catch a
//! regression in a change, within a test-count and time budget. The selection logic lives in
//! [`ste_runner`]; this crate is the command-line interface.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, Styles};
