//! Structured results produced by the formatter.

use crate::notify::Image;
use console::style;
use std::time::Duration;

/// Where a diagnostic was raised, relative to the working directory when
/// possible (`./Foo/BarTests.m`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: String,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One assertion failure inside a failing test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub reason_lines: Vec<String>,
    pub location: Location,
}

impl FailureDetail {
    pub fn reason(&self) -> String {
        self.reason_lines.join("\n")
    }
}

/// Everything reported for one failing test case.
///
/// A case can log several assertion failures before the line that closes it
/// out; they stack up in `details` in the order they were emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// 1-based position among the reports of one run.
    pub number: usize,
    pub case_label: String,
    pub details: Vec<FailureDetail>,
}

impl FailureReport {
    pub fn header(&self) -> String {
        format!("{}. {}", self.number, self.case_label)
    }

    /// Render the report the way it appears under "Failures:".
    pub fn render(&self) -> String {
        let mut out = format!("\n{}\n", self.header());
        for (i, detail) in self.details.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!(
                "    {}\n    {}\n",
                style(detail.reason()).red(),
                style(&detail.location).green()
            ));
        }
        out
    }
}

/// Totals for one test process run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub examples: usize,
    pub failures: usize,
    pub pending: usize,
    pub duration: Duration,
    pub image: Image,
    pub message: String,
}

impl Summary {
    pub fn passed(&self) -> bool {
        self.image != Image::Failed
    }
}

/// `"10 examples, 2 failures (1 pending)\nin 5.1235 seconds"`.
pub fn summary_message(
    example_count: usize,
    failure_count: usize,
    pending_count: usize,
    duration_secs: f64,
) -> String {
    let mut message = format!("{} examples, {} failures", example_count, failure_count);
    if pending_count > 0 {
        message.push_str(&format!(" ({} pending)", pending_count));
    }
    message.push_str(&format!("\nin {:.4} seconds", duration_secs));
    message
}
