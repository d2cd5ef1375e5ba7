//! Streaming classification of otest output.
//!
//! Lines arrive one at a time from the test process. Each is classified,
//! echoed to the sink, and either counted or buffered. Buffered diagnostics
//! are turned into a `FailureReport` when the line closing out a failed test
//! case arrives.

use super::types::{FailureDetail, FailureReport, Location, Summary, summary_message};
use crate::notify::{Image, Notification, Notifier};
use console::style;
use regex::Regex;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock};
use std::time::Instant;

static TEST_CASE_RESULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Test Case '([^']*)' (passed|failed)").unwrap());

static LIFECYCLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Test Suite '.*' (started|finished|passed|failed)|Test Case '.*' started|Executed \d+ tests?)",
    )
    .unwrap()
});

// path:line: error: case : reason
static LOCATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:\s][^:]*:\d+: error:").unwrap());

const DIAGNOSTIC_TOKEN: &str = ": error:";

/// What a single output line means to the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Passed,
    /// Carries the label from `Test Case '<label>' failed`.
    Failed(String),
    Diagnostic,
    Lifecycle,
    DateAnchor,
    Other,
    Blank,
}

/// Classify one line of otest output.
///
/// `date_stamp` is today's date as `YYYY-MM-DD`; NSLog output starts with it.
pub fn classify_line(line: &str, date_stamp: &str) -> LineKind {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    if let Some(cap) = TEST_CASE_RESULT_REGEX.captures(line) {
        return match &cap[2] {
            "passed" => LineKind::Passed,
            _ => LineKind::Failed(cap[1].to_string()),
        };
    }
    if !date_stamp.is_empty() && line.starts_with(date_stamp) {
        return LineKind::DateAnchor;
    }
    if line.contains(DIAGNOSTIC_TOKEN) {
        return LineKind::Diagnostic;
    }
    if LIFECYCLE_REGEX.is_match(line) {
        return LineKind::Lifecycle;
    }
    LineKind::Other
}

/// Consumes otest output and keeps running pass/fail counts.
pub struct Formatter<W: Write> {
    sink: W,
    verbose: bool,
    passed: usize,
    failed: usize,
    reports: Vec<FailureReport>,
    /// Diagnostic text waiting for the line that closes its test case.
    buffer: String,
    working_dir: String,
    date_stamp: String,
    start_time: Instant,
    notifier: Option<Arc<dyn Notifier>>,
    markers_written: bool,
}

impl<W: Write> Formatter<W> {
    /// Create a formatter echoing to `sink`.
    ///
    /// Locations are made relative to the process working directory and the
    /// date anchor is today's local date; see the `with_*` builders to
    /// override either.
    pub fn new(sink: W, verbose: bool) -> Self {
        let working_dir = std::env::current_dir()
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            sink,
            verbose,
            passed: 0,
            failed: 0,
            reports: Vec::new(),
            buffer: String::new(),
            working_dir,
            date_stamp: chrono::Local::now().format("%Y-%m-%d").to_string(),
            start_time: Instant::now(),
            notifier: None,
            markers_written: false,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_date_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.date_stamp = stamp.into();
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn failure_reports(&self) -> &[FailureReport] {
        &self.reports
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Feed one line of output.
    ///
    /// Only sink write errors are reported; unrecognized text is never
    /// dropped, it becomes part of the pending diagnostic.
    pub fn ingest(&mut self, line: &str) -> io::Result<()> {
        match classify_line(line, &self.date_stamp) {
            LineKind::Passed => {
                self.passed += 1;
                if self.verbose {
                    writeln!(self.sink, "{}", style(line).green())?;
                } else {
                    self.write_marker(style(".").green().to_string())?;
                }
            }
            LineKind::Failed(label) => {
                self.format_failure(&label);
                self.failed += 1;
                if self.verbose {
                    writeln!(self.sink, "{}", style(line).red())?;
                } else {
                    self.write_marker(style("F").red().to_string())?;
                }
            }
            LineKind::Diagnostic => {
                self.push_buffer(line);
                if self.verbose {
                    writeln!(self.sink, "{}", style(line).yellow())?;
                }
            }
            LineKind::Lifecycle => {
                if self.verbose {
                    writeln!(self.sink, "{}", line)?;
                }
            }
            LineKind::DateAnchor => {
                self.end_marker_line()?;
                writeln!(self.sink, "{}", line)?;
            }
            LineKind::Other => {
                self.push_buffer(line);
                if self.verbose {
                    writeln!(self.sink, "{}", line)?;
                }
            }
            LineKind::Blank => {}
        }
        self.sink.flush()
    }

    /// Write the failure block and the totals line, then notify.
    pub fn dump_summary(&mut self, with_notification: bool) -> io::Result<Summary> {
        self.end_marker_line()?;
        self.dump_failures()?;

        let duration = self.start_time.elapsed();
        let examples = self.passed + self.failed;
        let message = summary_message(examples, self.failed, 0, duration.as_secs_f64());
        let image = Image::classify(self.failed, 0);

        let flat = message.replace('\n', " ");
        match image {
            Image::Failed => writeln!(self.sink, "{}", style(&flat).red())?,
            _ => writeln!(self.sink, "{}", style(&flat).green())?,
        }
        self.sink.flush()?;
        tracing::info!(examples, failures = self.failed, "{}", flat);

        if with_notification && let Some(notifier) = &self.notifier {
            notifier.notify(&Notification::new(message.clone(), image));
        }

        Ok(Summary {
            examples,
            failures: self.failed,
            pending: 0,
            duration,
            image,
            message,
        })
    }

    fn dump_failures(&mut self) -> io::Result<()> {
        if self.reports.is_empty() {
            return Ok(());
        }
        writeln!(self.sink, "\nFailures:")?;
        for report in &self.reports {
            write!(self.sink, "{}", report.render())?;
        }
        writeln!(self.sink)
    }

    fn push_buffer(&mut self, line: &str) {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
    }

    /// Turn the pending diagnostics into one report.
    fn format_failure(&mut self, fallback_label: &str) {
        let buffer = std::mem::take(&mut self.buffer);
        let mut case_label = None;
        let mut details = Vec::new();

        for segment in split_segments(&buffer) {
            if let Some((case, detail)) = parse_segment(&segment, &self.working_dir) {
                case_label.get_or_insert(case);
                details.push(detail);
            }
        }

        let report = FailureReport {
            number: self.reports.len() + 1,
            case_label: case_label.unwrap_or_else(|| fallback_label.to_string()),
            details,
        };
        tracing::debug!(header = %report.header(), details = report.details.len(), "failure recorded");
        self.reports.push(report);
    }

    fn write_marker(&mut self, marker: String) -> io::Result<()> {
        self.markers_written = true;
        write!(self.sink, "{}", marker)
    }

    fn end_marker_line(&mut self) -> io::Result<()> {
        if self.markers_written {
            self.markers_written = false;
            writeln!(self.sink)?;
        }
        Ok(())
    }
}

/// Split buffered text at every location marker. Text before the first
/// marker is chatter and is dropped.
fn split_segments(buffer: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for line in buffer.split('\n') {
        if LOCATION_REGEX.is_match(line) {
            segments.push(line.to_string());
        } else if let Some(current) = segments.last_mut() {
            current.push('\n');
            current.push_str(line);
        }
    }
    segments
}

/// `file:line: error: case : reason...` into the case label and one detail.
fn parse_segment(segment: &str, working_dir: &str) -> Option<(String, FailureDetail)> {
    let mut fields: Vec<&str> = segment.split(':').collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    if fields.len() < 4 {
        return None;
    }

    let case = fields[3].trim().to_string();
    let reason = fields[4..].join(":");
    let reason_lines = reason.trim().lines().map(String::from).collect();

    Some((
        case,
        FailureDetail {
            reason_lines,
            location: Location {
                file: relative_path(fields[0], working_dir),
                line: fields[1].to_string(),
            },
        },
    ))
}

fn relative_path(path: &str, working_dir: &str) -> String {
    if working_dir.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(working_dir) {
        Some(rest) if rest.starts_with('/') => format!(".{}", rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;

    const CWD: &str = "/Users/dev/SampleApp";
    const TODAY: &str = "2013-01-29";

    fn formatter(verbose: bool) -> Formatter<Vec<u8>> {
        Formatter::new(Vec::new(), verbose)
            .with_working_dir(CWD)
            .with_date_stamp(TODAY)
    }

    fn output(f: Formatter<Vec<u8>>) -> String {
        let bytes = f.into_sink();
        console::strip_ansi_codes(&String::from_utf8(bytes).unwrap()).to_string()
    }

    #[test]
    fn test_classify_pass_and_fail() {
        assert_eq!(
            classify_line(
                "Test Case '-[testsPublicationCategories test2_shouldRequestPublicationsInAlphabetOrder]' passed (0.002 seconds).",
                TODAY
            ),
            LineKind::Passed
        );
        assert_eq!(
            classify_line(
                "Test Case '-[testsPublication test0_shouldFetchPublications]' failed (0.155 seconds).",
                TODAY
            ),
            LineKind::Failed("-[testsPublication test0_shouldFetchPublications]".into())
        );
    }

    #[test]
    fn test_classify_lifecycle_and_anchor() {
        assert_eq!(
            classify_line("Test Suite 'All tests' started at 2013-01-29 10:00:00 +0000", TODAY),
            LineKind::Lifecycle
        );
        assert_eq!(
            classify_line("Test Suite 'BarTests' finished at 2013-01-29 10:00:01 +0000.", TODAY),
            LineKind::Lifecycle
        );
        assert_eq!(
            classify_line("Test Case '-[BarTests testBaz]' started.", TODAY),
            LineKind::Lifecycle
        );
        assert_eq!(
            classify_line("Executed 3 tests, with 1 failure (0 unexpected) in 0.1 seconds", TODAY),
            LineKind::Lifecycle
        );
        assert_eq!(
            classify_line("2013-01-29 10:00:00.123 otest[812:7b03] hello", TODAY),
            LineKind::DateAnchor
        );
    }

    #[test]
    fn test_classify_diagnostic_other_blank() {
        assert_eq!(
            classify_line("/a/Foo.m:1: error: -[Foo testA] : boom", TODAY),
            LineKind::Diagnostic
        );
        assert_eq!(classify_line("should be equal to", TODAY), LineKind::Other);
        assert_eq!(
            classify_line("otest[812:7b03] unrecognized selector sent", TODAY),
            LineKind::Other
        );
        assert_eq!(classify_line("   ", TODAY), LineKind::Blank);
    }

    #[test]
    fn test_counts_passed_tests() {
        let mut f = formatter(false);
        f.ingest("Test Case '-[testsPublicationCategories test2_shouldRequestPublicationsInAlphabetOrder]' passed (0.002 seconds).").unwrap();
        assert_eq!(f.passed(), 1);
        assert_eq!(f.failed(), 0);
        assert!(f.failure_reports().is_empty());
    }

    #[test]
    fn test_counts_failed_tests() {
        let mut f = formatter(false);
        f.ingest("Test Case '-[testsPublication test0_shouldFetchPublications]' failed (0.155 seconds).").unwrap();
        assert_eq!(f.failed(), 1);
        assert_eq!(f.passed(), 0);
    }

    #[test]
    fn test_compact_markers() {
        let mut f = formatter(false);
        f.ingest("Test Case '-[A a]' passed (0.001 seconds).").unwrap();
        f.ingest("Test Case '-[A b]' failed (0.001 seconds).").unwrap();
        f.ingest("Test Suite 'A' started at 2013-01-29").unwrap();
        assert_eq!(output(f), ".F");
    }

    #[test]
    fn test_verbose_echoes_raw_lines() {
        let mut f = formatter(true);
        f.ingest("Test Suite 'A' started at 2013-01-29").unwrap();
        f.ingest("Test Case '-[A a]' passed (0.001 seconds).").unwrap();
        let out = output(f);
        assert!(out.contains("Test Suite 'A' started"));
        assert!(out.contains("Test Case '-[A a]' passed"));
    }

    #[test]
    fn test_date_anchor_echoed_without_verbose() {
        let mut f = formatter(false);
        f.ingest("2013-01-29 10:00:00.123 otest[812:7b03] loading bundle").unwrap();
        assert!(output(f).contains("loading bundle"));
    }

    #[test]
    fn test_single_error_failure_report() {
        let mut f = formatter(false);
        f.ingest(&format!(
            "{}/Foo/BarTests.m:68: error: -[BarTests testBaz] : '1' should be equal to '0':",
            CWD
        ))
        .unwrap();
        f.ingest("Test Case '-[BarTests testBaz]' failed (0.116 seconds).")
            .unwrap();

        let reports = f.failure_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].header(), "1. -[BarTests testBaz]");
        assert_eq!(reports[0].details.len(), 1);
        assert_eq!(reports[0].details[0].reason(), "'1' should be equal to '0'");
        assert_eq!(
            reports[0].details[0].location.to_string(),
            "./Foo/BarTests.m:68"
        );
    }

    #[test]
    fn test_stacked_errors_share_one_report() {
        let mut f = formatter(false);
        f.ingest(&format!(
            "{cwd}/Foo/BarTests.m:68: error: -[BarTests testBaz] : '1' should be equal to '0':\n{cwd}/Foo/BarTests.m:69: error: -[BarTests testBaz] : '3' should be equal to '2':",
            cwd = CWD
        ))
        .unwrap();
        f.ingest("Test Case '-[BarTests testBaz]' failed (0.116 seconds).")
            .unwrap();

        let reports = f.failure_reports();
        assert_eq!(reports.len(), 1);
        let rendered = console::strip_ansi_codes(&reports[0].render()).to_string();
        assert_eq!(rendered.matches("1.").count(), 1);
        assert_eq!(reports[0].details.len(), 2);
        assert_eq!(reports[0].details[1].reason(), "'3' should be equal to '2'");
        assert_eq!(
            reports[0].details[1].location.to_string(),
            "./Foo/BarTests.m:69"
        );
    }

    #[test]
    fn test_multiline_reason_from_continuation_lines() {
        let mut f = formatter(false);
        f.ingest(&format!(
            "{}/Foo/BarTests.m:68: error: -[BarTests testBaz] : '1'",
            CWD
        ))
        .unwrap();
        f.ingest("should be equal to").unwrap();
        f.ingest("'0':").unwrap();
        f.ingest("Test Case '-[BarTests testBaz]' failed (0.116 seconds).")
            .unwrap();

        let detail = &f.failure_reports()[0].details[0];
        assert_eq!(
            detail.reason_lines,
            vec!["'1'", "should be equal to", "'0'"]
        );
    }

    #[test]
    fn test_continuation_mentioning_otest_is_kept() {
        let mut f = formatter(false);
        f.ingest(&format!(
            "{}/Foo/BarTests.m:68: error: -[BarTests testBaz] : exception raised",
            CWD
        ))
        .unwrap();
        f.ingest("thrown from otest_helper frame 3").unwrap();
        f.ingest("Test Case '-[BarTests testBaz]' failed (0.001 seconds).")
            .unwrap();

        let detail = &f.failure_reports()[0].details[0];
        assert_eq!(
            detail.reason_lines,
            vec!["exception raised", "thrown from otest_helper frame 3"]
        );
    }

    #[test]
    fn test_reports_are_numbered_in_order() {
        let mut f = formatter(false);
        for (n, case) in ["testA", "testB"].iter().enumerate() {
            f.ingest(&format!(
                "{}/Foo/BarTests.m:{}: error: -[BarTests {}] : nope",
                CWD,
                10 + n,
                case
            ))
            .unwrap();
            f.ingest(&format!("Test Case '-[BarTests {}]' failed (0.1 seconds).", case))
                .unwrap();
        }
        let headers: Vec<String> = f.failure_reports().iter().map(|r| r.header()).collect();
        assert_eq!(headers, vec!["1. -[BarTests testA]", "2. -[BarTests testB]"]);
    }

    #[test]
    fn test_failure_without_diagnostics_uses_case_label() {
        let mut f = formatter(false);
        f.ingest("some unrelated chatter").unwrap();
        f.ingest("Test Case '-[BarTests testCrash]' failed (0.1 seconds).")
            .unwrap();
        let report = &f.failure_reports()[0];
        assert_eq!(report.case_label, "-[BarTests testCrash]");
        assert!(report.details.is_empty());
    }

    #[test]
    fn test_paths_outside_working_dir_stay_absolute() {
        let mut f = formatter(false);
        f.ingest("/opt/shared/Helpers.m:12: error: -[H testX] : bad").unwrap();
        f.ingest("Test Case '-[H testX]' failed (0.1 seconds).").unwrap();
        assert_eq!(
            f.failure_reports()[0].details[0].location.file,
            "/opt/shared/Helpers.m"
        );
    }

    #[test]
    fn test_dump_summary_on_fresh_formatter() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut f = formatter(false).with_notifier(notifier.clone());
        let summary = f.dump_summary(true).unwrap();

        assert!(summary.message.starts_with("0 examples, 0 failures\nin 0."));
        assert!(summary.message.ends_with(" seconds"));
        assert!(summary.duration.as_secs_f64() >= 0.0);
        assert_eq!(summary.image, Image::Success);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].image, Image::Success);
        assert_eq!(sent[0].priority, -2);
        assert_eq!(sent[0].title, "OCUnit results");
    }

    #[test]
    fn test_dump_summary_without_notification() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut f = formatter(false).with_notifier(notifier.clone());
        f.dump_summary(false).unwrap();
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_dump_summary_writes_failures_block() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut f = formatter(false).with_notifier(notifier.clone());
        f.ingest("Test Case '-[A a]' passed (0.001 seconds).").unwrap();
        f.ingest(&format!("{}/Foo/ATests.m:3: error: -[A b] : nope", CWD))
            .unwrap();
        f.ingest("Test Case '-[A b]' failed (0.001 seconds).").unwrap();
        let summary = f.dump_summary(true).unwrap();

        assert_eq!(summary.examples, 2);
        assert_eq!(summary.failures, 1);
        assert!(!summary.passed());
        assert_eq!(notifier.sent()[0].priority, 2);

        let out = output(f);
        assert!(out.contains("Failures:"));
        assert!(out.contains("1. -[A b]"));
        assert!(out.contains("./Foo/ATests.m:3"));
        assert!(out.contains("2 examples, 1 failures"));
    }

    #[test]
    fn test_no_failures_block_when_all_pass() {
        let mut f = formatter(false);
        f.ingest("Test Case '-[A a]' passed (0.001 seconds).").unwrap();
        f.dump_summary(false).unwrap();
        assert!(!output(f).contains("Failures:"));
    }
}
