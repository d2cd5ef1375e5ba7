//! Build and test execution.
//!
//! The guard never launches tools itself. It hands a target list to a
//! `TestExecutor` and gets back whether the run passed. `XcodeRunner` is the
//! real implementation; guard tests script their own.

mod options;
mod xcode;

pub use options::{RunOverrides, RunnerOptions};
pub use xcode::{PathVariables, XcodeRunner, build_arguments, otest_environment, test_suites};

use anyhow::Result;
use async_trait::async_trait;

/// Abstraction over build+test execution for testability.
/// Real implementation: `XcodeRunner`.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Build and run `targets`. An empty target list returns `false` without
    /// running anything.
    async fn run(&self, targets: &[String], overrides: &RunOverrides) -> Result<bool>;
}
