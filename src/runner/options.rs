//! Options for building and running a test bundle.

use serde::{Deserialize, Serialize};

fn default_sdk() -> String {
    "iPhoneSimulator6.0".to_string()
}

fn default_notification() -> bool {
    true
}

/// How the runner builds the project and launches otest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerOptions {
    /// Bundle name without the `.octest` extension
    #[serde(default)]
    pub test_bundle: Option<String>,
    /// Build output root; defaults to the project folder
    #[serde(default)]
    pub derived_data: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    /// Path to the `.xcodeproj`
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_sdk")]
    pub sdk: String,
    /// Echo every otest line instead of compact markers
    #[serde(default)]
    pub verbose: bool,
    /// Send notifications for run results
    #[serde(default = "default_notification")]
    pub notification: bool,
    /// Run `clean` before `build`
    #[serde(default)]
    pub clean: bool,
    /// Extra `KEY=VALUE` words appended to the xcodebuild invocation
    #[serde(default)]
    pub build_variables: Option<String>,
    /// Extra `KEY=VALUE` words exported to the otest environment
    #[serde(default)]
    pub test_variables: Option<String>,
    /// xcodebuild executable (default: "xcodebuild")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xcodebuild_cmd: Option<String>,
    /// otest executable (default: the one inside the simulator SDK)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otest_cmd: Option<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            test_bundle: None,
            derived_data: None,
            workspace: None,
            scheme: None,
            project: None,
            sdk: default_sdk(),
            verbose: false,
            notification: default_notification(),
            clean: false,
            build_variables: None,
            test_variables: None,
            xcodebuild_cmd: None,
            otest_cmd: None,
        }
    }
}

impl RunnerOptions {
    /// Apply per-run overrides on top of these options.
    pub fn merged(&self, overrides: &RunOverrides) -> Self {
        let mut options = self.clone();
        if let Some(ref v) = overrides.test_bundle {
            options.test_bundle = Some(v.clone());
        }
        if let Some(ref v) = overrides.derived_data {
            options.derived_data = Some(v.clone());
        }
        if let Some(ref v) = overrides.workspace {
            options.workspace = Some(v.clone());
        }
        if let Some(ref v) = overrides.scheme {
            options.scheme = Some(v.clone());
        }
        if let Some(ref v) = overrides.project {
            options.project = Some(v.clone());
        }
        if let Some(ref v) = overrides.sdk {
            options.sdk = v.clone();
        }
        if let Some(v) = overrides.verbose {
            options.verbose = v;
        }
        if let Some(v) = overrides.notification {
            options.notification = v;
        }
        if let Some(v) = overrides.clean {
            options.clean = v;
        }
        if let Some(ref v) = overrides.build_variables {
            options.build_variables = Some(v.clone());
        }
        if let Some(ref v) = overrides.test_variables {
            options.test_variables = Some(v.clone());
        }
        options
    }
}

/// Per-run adjustments to `RunnerOptions`, plus the banner message.
///
/// Also the shape of the `[run_all]` config section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOverrides {
    /// Banner printed instead of "Running: <targets>"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_variables: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_variables: Option<String>,
}

impl RunOverrides {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = Some(clean);
        self
    }
}
