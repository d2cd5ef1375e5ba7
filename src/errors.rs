//! Typed error hierarchy for ocguard.
//!
//! Two enums cover the two places where callers may want to match on a
//! failure instead of just reporting it:
//! - `RunnerError`: build/test process faults inside the xcode runner
//! - `GuardError`: focus file handling in the guard

use thiserror::Error;

/// Faults raised while driving the external build and test tools.
///
/// These never escape `TestExecutor::run`: the runner logs them, notifies,
/// and reports the run as not passed.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build exited with code {code}")]
    BuildFailed { code: i32 },

    #[error("Test process exited with unexpected code {code}")]
    UnexpectedExit { code: i32 },

    #[error("Failed to read test output: {0}")]
    OutputRead(#[source] std::io::Error),
}

/// Errors from the guard state machine.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Failed to read focus file at {path}: {source}")]
    FocusFileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove focus file at {path}: {source}")]
    FocusFileRemove {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
