//! The retry, focus and escalation policy around test runs.
//!
//! A `Guard` receives batches of changed paths, narrows them to test targets,
//! runs them and remembers what failed. While something is failing, later
//! batches also rerun the remembered failures; once a failing selection
//! passes the guard can escalate to a full run. With `focus_on_failed`, the
//! failing test identifiers recorded by the test process (the focus file)
//! replace the batch until they pass.

mod history;
mod options;

pub use history::FailureHistory;
pub use options::{DEFAULT_FOCUS_FILE, GuardOptions};

use crate::errors::GuardError;
use crate::inspector::Inspector;
use crate::runner::{RunOverrides, TestExecutor};
use anyhow::Result;
use std::path::Path;

/// Target that selects every test in the bundle.
pub const ALL_TARGET: &str = "All";
pub const RUN_ALL_MESSAGE: &str = "Running all tests";
/// Most focus-file entries run in one focused pass.
pub const FOCUS_LIMIT: usize = 11;
/// Upper bound on focused passes chained from one change batch.
pub const MAX_FOCUS_ROUNDS: usize = 8;

/// Outcome of one guard operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
    /// Nothing survived selection; no tests ran and history is unchanged.
    NothingToRun,
}

impl RunStatus {
    pub fn is_failure(self) -> bool {
        self == RunStatus::Failed
    }
}

pub struct Guard<E: TestExecutor> {
    options: GuardOptions,
    inspector: Inspector,
    executor: E,
    history: FailureHistory,
}

impl<E: TestExecutor> Guard<E> {
    /// Build a guard whose inspector uses the configured roots and exclusion.
    pub fn new(options: GuardOptions, executor: E) -> Result<Self> {
        let inspector = Inspector::new(options.test_paths.clone(), options.exclude.as_deref())?;
        Ok(Self::with_inspector(options, inspector, executor))
    }

    pub fn with_inspector(options: GuardOptions, inspector: Inspector, executor: E) -> Self {
        Self {
            options,
            inspector,
            executor,
            history: FailureHistory::default(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn last_failed(&self) -> bool {
        self.history.last_failed
    }

    pub fn failed_paths(&self) -> &[String] {
        &self.history.failed_paths
    }

    pub fn set_last_failed(&mut self, last_failed: bool) {
        self.history.last_failed = last_failed;
    }

    /// Called once when watching begins.
    pub async fn start(&mut self) -> Result<RunStatus> {
        tracing::info!("ocguard is running");
        if self.options.all_on_start {
            self.run_all().await
        } else {
            Ok(RunStatus::Passed)
        }
    }

    /// Run the whole bundle. A pass forgets every remembered failure.
    pub async fn run_all(&mut self) -> Result<RunStatus> {
        let overrides = self
            .options
            .run_all
            .clone()
            .with_message(RUN_ALL_MESSAGE)
            .with_clean(true);
        let passed = self
            .executor
            .run(&[ALL_TARGET.to_string()], &overrides)
            .await?;

        self.history.last_failed = !passed;
        if passed {
            self.history.clear();
            Ok(RunStatus::Passed)
        } else {
            Ok(RunStatus::Failed)
        }
    }

    /// Forget remembered failures without running anything.
    pub fn reload(&mut self) {
        self.history.clear();
    }

    /// Run the tests affected by a batch of changed paths.
    pub async fn run_on_changes<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<RunStatus> {
        let mut batch: Vec<String> = paths.iter().map(|p| p.as_ref().to_string()).collect();

        for round in 0..MAX_FOCUS_ROUNDS {
            let (targets, focused) = self.select_targets(&batch)?;
            if targets.is_empty() {
                tracing::debug!(round, "no test targets selected");
                return Ok(RunStatus::NothingToRun);
            }

            let passed = self.executor.run(&targets, &RunOverrides::default()).await?;
            if !passed {
                self.history.last_failed = true;
                if !focused {
                    self.add_failed(&targets);
                }
                return Ok(RunStatus::Failed);
            }

            if !focused {
                self.remove_failed(&targets);
            }

            if self.history.last_failed && focused && !self.history.failed_paths.is_empty() {
                tracing::debug!(round, "focused tests pass, rerunning remembered failures");
                batch = self.history.failed_paths.clone();
                continue;
            }
            if self.history.last_failed && self.options.all_after_pass {
                self.history.last_failed = false;
                return self.run_all().await;
            }
            return Ok(RunStatus::Passed);
        }

        tracing::warn!(
            rounds = MAX_FOCUS_ROUNDS,
            "stopped rerunning focused tests; failures are still remembered"
        );
        Ok(RunStatus::Passed)
    }

    /// Decide what to run for `paths`, and whether it is a focused run.
    fn select_targets(&mut self, paths: &[String]) -> Result<(Vec<String>, bool)> {
        if self.history.last_failed
            && self.options.focus_on_failed
            && let Some(mut failed_tests) = take_focus_file(&self.options.focus_file)?
        {
            if let [single] = paths
                && self.inspector.clean(&[single]).len() == 1
            {
                failed_tests.retain(|test| test.contains(single.as_str()));
            }

            if !failed_tests.is_empty() {
                failed_tests.truncate(FOCUS_LIMIT);
                tracing::debug!(tests = failed_tests.len(), "focusing on failed tests");
                self.add_failed(paths);
                let files: Vec<&str> = failed_tests
                    .iter()
                    .map(|test| test.split(':').next().unwrap_or(test.as_str()))
                    .collect();
                self.add_failed(&files);
                return Ok((failed_tests, true));
            }
        }

        let mut candidates = paths.to_vec();
        if self.options.keep_failed {
            candidates.extend(self.history.failed_paths.iter().cloned());
        }
        Ok((self.inspector.clean(&candidates), false))
    }

    fn add_failed<S: AsRef<str>>(&mut self, paths: &[S]) {
        if self.options.keep_failed {
            self.history.add(paths);
        }
    }

    fn remove_failed<S: AsRef<str>>(&mut self, paths: &[S]) {
        if self.options.keep_failed {
            self.history.remove(paths);
        }
    }
}

/// Read and delete the focus file. `None` when it does not exist.
fn take_focus_file(path: &Path) -> Result<Option<Vec<String>>, GuardError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| GuardError::FocusFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::remove_file(path).map_err(|source| GuardError::FocusFileRemove {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    ))
}
