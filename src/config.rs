//! Configuration for ocguard.
//!
//! Settings are read from `.ocguard/ocguard.toml` under the project directory,
//! then adjusted by environment variables and finally by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [guard]
//! focus_on_failed = false
//! all_after_pass = true
//! all_on_start = true
//! keep_failed = true
//! test_paths = ["Tests"]
//! exclude = "Tests/Vendor/**/*.m"
//! focus_file = "tmp/ocunit_guard_result"
//!
//! [runner]
//! test_bundle = "SampleAppTests"
//! project = "SampleApp.xcodeproj"
//! sdk = "iPhoneSimulator6.0"
//! build_variables = "GCC_PREPROCESSOR_DEFINITIONS=TESTING"
//!
//! [run_all]
//! scheme = "SampleApp-All"
//!
//! [notification]
//! enabled = true
//! command = "notify-send"
//! ```
//!
//! Environment overrides:
//! - `OCGUARD_XCODEBUILD` - xcodebuild command line
//! - `OCGUARD_OTEST` - otest command line
//! - `OCGUARD_NOTIFY_CMD` - notification program

use crate::guard::GuardOptions;
use crate::notify::{CommandNotifier, LogNotifier, Notifier};
use crate::runner::{RunOverrides, RunnerOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONFIG_DIR: &str = ".ocguard";
pub const CONFIG_FILE: &str = "ocguard.toml";

pub const XCODEBUILD_ENV: &str = "OCGUARD_XCODEBUILD";
pub const OTEST_ENV: &str = "OCGUARD_OTEST";
pub const NOTIFY_CMD_ENV: &str = "OCGUARD_NOTIFY_CMD";

fn default_enabled() -> bool {
    true
}

/// Where run results are announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSection {
    /// Master switch; `false` silences every notification
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Program invoked as `<command> <title> <message>`; terminal only if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            command: None,
        }
    }
}

/// The complete ocguard.toml configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcguardToml {
    #[serde(default)]
    pub guard: GuardOptions,
    #[serde(default)]
    pub runner: RunnerOptions,
    /// Overrides applied to full runs only
    #[serde(default)]
    pub run_all: RunOverrides,
    #[serde(default)]
    pub notification: NotificationSection,
}

impl OcguardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse ocguard.toml")
    }

    /// Load `ocguard.toml` from `config_dir`, or defaults when it is missing.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize ocguard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.guard.test_paths.is_empty() {
            warnings.push("guard.test_paths is empty: no file will ever be selected".to_string());
        }
        if let Some(ref pattern) = self.guard.exclude
            && let Err(e) = glob::Pattern::new(pattern)
        {
            warnings.push(format!("Invalid exclude pattern '{}': {}", pattern, e));
        }
        if self.runner.sdk.trim().is_empty() {
            warnings.push("runner.sdk is empty".to_string());
        }
        if let Some(ref sdk) = self.run_all.sdk
            && sdk.trim().is_empty()
        {
            warnings.push("run_all.sdk is empty".to_string());
        }

        warnings
    }
}

/// Fully resolved configuration for one ocguard invocation.
///
/// It merges settings from:
/// 1. ocguard.toml
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct OcguardConfig {
    pub project_dir: PathBuf,
    /// Path to the .ocguard directory
    pub config_dir: PathBuf,
    pub toml: OcguardToml,
    /// CLI override: echo all test output
    pub verbose: bool,
    /// CLI override: enable focus mode
    pub focus: bool,
}

impl OcguardConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = OcguardToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
            focus: false,
        })
    }

    /// Create OcguardConfig with CLI overrides.
    pub fn with_cli_args(project_dir: PathBuf, verbose: bool, focus: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.focus = focus;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Runner options (file → env → CLI).
    pub fn runner_options(&self) -> RunnerOptions {
        self.runner_options_with_env(|key| std::env::var(key).ok())
    }

    pub fn runner_options_with_env(&self, env: impl Fn(&str) -> Option<String>) -> RunnerOptions {
        let mut options = self.toml.runner.clone();
        if let Some(cmd) = env(XCODEBUILD_ENV).filter(|v| !v.is_empty()) {
            options.xcodebuild_cmd = Some(cmd);
        }
        if let Some(cmd) = env(OTEST_ENV).filter(|v| !v.is_empty()) {
            options.otest_cmd = Some(cmd);
        }
        options.verbose |= self.verbose;
        options.notification &= self.toml.notification.enabled;
        options
    }

    /// Guard options with the `[run_all]` section folded in and the focus
    /// file anchored at the project directory.
    pub fn guard_options(&self) -> GuardOptions {
        let mut options = self.toml.guard.clone();
        options.run_all = self.toml.run_all.clone();
        options.focus_on_failed |= self.focus;
        if options.focus_file.is_relative() {
            options.focus_file = self.project_dir.join(&options.focus_file);
        }
        options
    }

    /// The notifier selected by config (env → file → terminal).
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier_with_env(|key| std::env::var(key).ok())
    }

    pub fn notifier_with_env(&self, env: impl Fn(&str) -> Option<String>) -> Arc<dyn Notifier> {
        let command = env(NOTIFY_CMD_ENV)
            .filter(|v| !v.is_empty())
            .or_else(|| self.toml.notification.command.clone());
        match command {
            Some(program) => Arc::new(CommandNotifier::new(program)),
            None => Arc::new(LogNotifier),
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        for root in &self.toml.guard.test_paths {
            if !self.project_dir.join(root).exists() {
                warnings.push(format!("Test path '{}' does not exist", root));
            }
        }
        warnings
    }
}
