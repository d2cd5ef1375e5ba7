use crate::runner::RunOverrides;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the test process records failing test identifiers, one per line.
pub const DEFAULT_FOCUS_FILE: &str = "tmp/ocunit_guard_result";

fn default_true() -> bool {
    true
}

fn default_test_paths() -> Vec<String> {
    vec!["Tests".to_string()]
}

fn default_focus_file() -> PathBuf {
    PathBuf::from(DEFAULT_FOCUS_FILE)
}

/// Retry and escalation policy for the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardOptions {
    /// After a failure, rerun only the recorded failing tests
    #[serde(default)]
    pub focus_on_failed: bool,
    /// Run everything once a previously failing selection passes
    #[serde(default = "default_true")]
    pub all_after_pass: bool,
    /// Run everything when the guard starts
    #[serde(default = "default_true")]
    pub all_on_start: bool,
    /// Remember failing targets and fold them into later runs
    #[serde(default = "default_true")]
    pub keep_failed: bool,
    /// Test roots handed to the inspector
    #[serde(default = "default_test_paths")]
    pub test_paths: Vec<String>,
    /// Glob of files never to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(default = "default_focus_file")]
    pub focus_file: PathBuf,
    /// Overrides for full runs; lives in its own `[run_all]` config section
    #[serde(skip)]
    pub run_all: RunOverrides,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            focus_on_failed: false,
            all_after_pass: true,
            all_on_start: true,
            keep_failed: true,
            test_paths: default_test_paths(),
            exclude: None,
            focus_file: default_focus_file(),
            run_all: RunOverrides::default(),
        }
    }
}
