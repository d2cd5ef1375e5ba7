//! Test output formatting for ocguard.
//!
//! otest reports results as free-form text on stderr. This module turns that
//! stream into counts and structured failure reports:
//!
//! - `Test Case '-[Suite test]' passed (...)` - one passing example
//! - `Test Case '-[Suite test]' failed (...)` - one failing example, closes
//!   out any diagnostics buffered since the previous failure
//! - `/abs/path/FooTests.m:68: error: -[Suite test] : reason` - an assertion
//!   failure location; continuation lines that follow belong to its reason
//!
//! Suite banners and NSLog chatter are echoed only in verbose mode, except
//! for lines stamped with today's date, which are always shown.

mod parser;
mod types;

pub use parser::{Formatter, LineKind, classify_line};
pub use types::{FailureDetail, FailureReport, Location, Summary, summary_message};
