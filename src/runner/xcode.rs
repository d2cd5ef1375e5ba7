//! xcodebuild + otest execution.

use super::TestExecutor;
use super::options::{RunOverrides, RunnerOptions};
use crate::errors::RunnerError;
use crate::formatter::{Formatter, Summary};
use crate::notify::{Notification, Notifier};
use anyhow::Result;
use async_trait::async_trait;
use console::style;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const SUCCESS_BUILD_CODE: i32 = 0;
// otest exits 0 when everything passed (and sometimes when it could not run
// at all) and 1 when tests failed. Anything else means the run was invalid.
const SUCCESS_EXIT_CODE: i32 = 0;
const MISC_ERROR_EXIT_CODE: i32 = 1;

const DEVELOPER_ROOT: &str = "/Applications/Xcode.app/Contents/Developer";
const DEFAULT_XCODEBUILD: &str = "xcodebuild";

/// Toolchain locations derived from the runner options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathVariables {
    pub source_root: String,
    pub derived_data: String,
    /// Always ends with `/`
    pub built_products_dir: String,
    pub dev_root: String,
    pub sdk_root: String,
}

impl PathVariables {
    pub fn resolve(options: &RunnerOptions, project_dir: &Path) -> Self {
        let project_folder = options.project.as_deref().map(|project| {
            match Path::new(project).parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.to_string_lossy().into_owned()
                }
                _ => ".".to_string(),
            }
        });
        let source_root =
            project_folder.unwrap_or_else(|| project_dir.to_string_lossy().into_owned());
        let derived_data = options
            .derived_data
            .clone()
            .unwrap_or_else(|| source_root.clone());
        let built_products_dir = join(&derived_data, "build/");
        let dev_root = DEVELOPER_ROOT.to_string();
        let sdk_root = join(
            &dev_root,
            &format!(
                "Platforms/iPhoneSimulator.platform/Developer/SDKs/{}.sdk",
                options.sdk
            ),
        );

        Self {
            source_root,
            derived_data,
            built_products_dir,
            dev_root,
            sdk_root,
        }
    }

    pub fn otest_path(&self) -> String {
        join(&self.sdk_root, "Developer/usr/bin/otest")
    }
}

fn join(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

/// Arguments for the xcodebuild step, in invocation order.
pub fn build_arguments(options: &RunnerOptions, paths: &PathVariables) -> Vec<String> {
    let mut args = Vec::new();
    let workspace = non_empty(&options.workspace);

    if let Some(workspace) = workspace {
        args.extend(["-workspace".to_string(), workspace.to_string()]);
    }
    if let Some(scheme) = non_empty(&options.scheme) {
        args.extend(["-scheme".to_string(), scheme.to_string()]);
    }
    if let Some(project) = non_empty(&options.project) {
        args.extend(["-project".to_string(), project.to_string()]);
    }
    args.extend(["-sdk".to_string(), options.sdk.to_lowercase()]);
    args.extend(["-configuration".to_string(), "Debug".to_string()]);
    if workspace.is_none() {
        args.push("-alltargets".to_string());
    }
    if options.clean {
        args.push("clean".to_string());
    }
    args.push("build".to_string());
    args.push(format!("CONFIGURATION_BUILD_DIR={}", paths.built_products_dir));
    if let Some(vars) = non_empty(&options.build_variables) {
        args.extend(vars.split_whitespace().map(String::from));
    }
    args
}

/// Reduce targets to the `-SenTest` selector.
///
/// `Tests/FooTests.m` becomes `FooTests`, `FooTests.m:testBar` becomes
/// `FooTests/testBar`; line-number suffixes cannot be selected and are
/// dropped.
pub fn test_suites(targets: &[String]) -> String {
    let mut suites: Vec<String> = Vec::new();
    for target in targets {
        let (file, case) = match target.split_once(':') {
            Some((file, case)) => (file, Some(case)),
            None => (target.as_str(), None),
        };
        let name = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        let class = name.strip_suffix(".m").unwrap_or(&name).to_string();
        let suite = match case {
            Some(case) if !case.is_empty() && !case.chars().all(|c| c.is_ascii_digit()) => {
                format!("{}/{}", class, case)
            }
            _ => class,
        };
        if !suites.contains(&suite) {
            suites.push(suite);
        }
    }
    suites.join(",")
}

/// Environment otest needs to load the simulator frameworks.
pub fn otest_environment(options: &RunnerOptions, paths: &PathVariables) -> Vec<(String, String)> {
    let mut env = vec![
        (
            "DYLD_FRAMEWORK_PATH".to_string(),
            format!(
                "{}:{}",
                paths.built_products_dir,
                join(
                    &paths.sdk_root,
                    "Applications/Xcode.app/Contents/Developer/Library/Frameworks"
                )
            ),
        ),
        (
            "DYLD_LIBRARY_PATH".to_string(),
            paths.built_products_dir.clone(),
        ),
        ("DYLD_NEW_LOCAL_SHARED_REGIONS".to_string(), "YES".to_string()),
        ("DYLD_NO_FIX_PREBINDING".to_string(), "YES".to_string()),
        ("DYLD_ROOT_PATH".to_string(), paths.sdk_root.clone()),
        ("IPHONE_SIMULATOR_ROOT".to_string(), paths.sdk_root.clone()),
    ];

    if let Some(vars) = non_empty(&options.test_variables) {
        for word in vars.split_whitespace() {
            match word.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    env.push((key.to_string(), value.to_string()))
                }
                _ => tracing::warn!(word, "ignoring test variable without KEY=VALUE form"),
            }
        }
    }
    env
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Split a configured command line into program and leading arguments.
fn command_words(command: &str) -> (String, Vec<String>) {
    let mut words = command.split_whitespace().map(String::from);
    let program = words.next().unwrap_or_default();
    (program, words.collect())
}

/// Builds the project with xcodebuild, then runs the bundle with otest.
pub struct XcodeRunner {
    options: RunnerOptions,
    project_dir: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl XcodeRunner {
    pub fn new(options: RunnerOptions, project_dir: PathBuf, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            options,
            project_dir,
            notifier,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    async fn run_via_shell(
        &self,
        targets: &[String],
        options: &RunnerOptions,
    ) -> Result<Summary, RunnerError> {
        let paths = PathVariables::resolve(options, &self.project_dir);

        let build_code = self.xcodebuild(options, &paths).await?;
        if build_code != SUCCESS_BUILD_CODE {
            return Err(RunnerError::BuildFailed { code: build_code });
        }

        let (exit_code, summary) = self.run_otest(targets, options, &paths).await?;
        if !(SUCCESS_EXIT_CODE..=MISC_ERROR_EXIT_CODE).contains(&exit_code) {
            return Err(RunnerError::UnexpectedExit { code: exit_code });
        }
        Ok(summary)
    }

    async fn xcodebuild(
        &self,
        options: &RunnerOptions,
        paths: &PathVariables,
    ) -> Result<i32, RunnerError> {
        let command = options
            .xcodebuild_cmd
            .clone()
            .unwrap_or_else(|| DEFAULT_XCODEBUILD.to_string());
        let (program, mut args) = command_words(&command);
        args.extend(build_arguments(options, paths));
        tracing::debug!(program = %program, args = %args.join(" "), "building");

        let status = Command::new(&program)
            .args(&args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| RunnerError::SpawnFailed { program, source })?;

        Ok(status.code().unwrap_or(-1))
    }

    async fn run_otest(
        &self,
        targets: &[String],
        options: &RunnerOptions,
        paths: &PathVariables,
    ) -> Result<(i32, Summary), RunnerError> {
        let command = options
            .otest_cmd
            .clone()
            .unwrap_or_else(|| paths.otest_path());
        let (program, mut args) = command_words(&command);
        let bundle = format!(
            "{}{}.octest",
            paths.built_products_dir,
            options.test_bundle.as_deref().unwrap_or_default()
        );
        args.extend(["-SenTest".to_string(), test_suites(targets), bundle]);
        tracing::debug!(program = %program, args = %args.join(" "), "running otest");

        let mut child = Command::new(&program)
            .args(&args)
            .envs(otest_environment(options, paths))
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::SpawnFailed {
                program: program.clone(),
                source,
            })?;

        let mut formatter = Formatter::new(std::io::stderr(), options.verbose)
            .with_working_dir(self.project_dir.to_string_lossy())
            .with_notifier(self.notifier.clone());

        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await.map_err(RunnerError::OutputRead)? {
                formatter.ingest(&line).map_err(RunnerError::OutputRead)?;
            }
        }

        let status = child.wait().await.map_err(RunnerError::OutputRead)?;
        let summary = formatter
            .dump_summary(options.notification)
            .map_err(RunnerError::OutputRead)?;
        Ok((status.code().unwrap_or(-1), summary))
    }
}

#[async_trait]
impl TestExecutor for XcodeRunner {
    async fn run(&self, targets: &[String], overrides: &RunOverrides) -> Result<bool> {
        if targets.is_empty() {
            return Ok(false);
        }

        let message = overrides
            .message
            .clone()
            .unwrap_or_else(|| format!("Running: {}", targets.join(" ")));
        println!("{}", style(&message).cyan().bold());
        tracing::info!(targets = targets.len(), "{}", message);

        let options = self.options.merged(overrides);
        match self.run_via_shell(targets, &options).await {
            Ok(summary) => Ok(summary.failures == 0),
            Err(e) => {
                tracing::warn!(error = %e, "test run did not complete");
                eprintln!("{} {}", style("Run failed:").red().bold(), e);
                if options.notification {
                    self.notifier.notify(&Notification::run_failed());
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Image;
    use crate::notify::testing::RecordingNotifier;

    fn resolve(options: &RunnerOptions) -> PathVariables {
        PathVariables::resolve(options, Path::new("/work/SampleApp"))
    }

    fn build_line(options: &RunnerOptions) -> String {
        build_arguments(options, &resolve(options)).join(" ")
    }

    #[test]
    fn test_default_build_arguments() {
        assert_eq!(
            build_line(&RunnerOptions::default()),
            "-sdk iphonesimulator6.0 -configuration Debug -alltargets build CONFIGURATION_BUILD_DIR=/work/SampleApp/build/"
        );
    }

    #[test]
    fn test_derived_data_sets_build_dir() {
        let options = RunnerOptions {
            derived_data: Some("/tmp/sample/".into()),
            ..Default::default()
        };
        assert_eq!(
            build_line(&options),
            "-sdk iphonesimulator6.0 -configuration Debug -alltargets build CONFIGURATION_BUILD_DIR=/tmp/sample/build/"
        );
    }

    #[test]
    fn test_workspace_with_scheme_drops_alltargets() {
        let options = RunnerOptions {
            workspace: Some("testWorkspace".into()),
            scheme: Some("testScheme".into()),
            ..Default::default()
        };
        assert_eq!(
            build_line(&options),
            "-workspace testWorkspace -scheme testScheme -sdk iphonesimulator6.0 -configuration Debug build CONFIGURATION_BUILD_DIR=/work/SampleApp/build/"
        );
    }

    #[test]
    fn test_project_builds_into_its_own_folder() {
        let options = RunnerOptions {
            project: Some("~/Documents/SampleApp.xcodeproj".into()),
            ..Default::default()
        };
        assert_eq!(
            build_line(&options),
            "-project ~/Documents/SampleApp.xcodeproj -sdk iphonesimulator6.0 -configuration Debug -alltargets build CONFIGURATION_BUILD_DIR=~/Documents/build/"
        );
    }

    #[test]
    fn test_bare_project_name_builds_in_current_folder() {
        let options = RunnerOptions {
            project: Some("sample.xcodeproj".into()),
            ..Default::default()
        };
        assert_eq!(resolve(&options).built_products_dir, "./build/");
    }

    #[test]
    fn test_sdk_is_lowercased_and_linked() {
        let options = RunnerOptions {
            sdk: "iPhoneSimulator5.0".into(),
            ..Default::default()
        };
        assert!(build_line(&options).starts_with("-sdk iphonesimulator5.0 "));
        assert!(
            resolve(&options)
                .sdk_root
                .ends_with("SDKs/iPhoneSimulator5.0.sdk")
        );
    }

    #[test]
    fn test_clean_and_build_variables() {
        let options = RunnerOptions {
            clean: true,
            build_variables: Some("TEST_HOST=build".into()),
            ..Default::default()
        };
        assert_eq!(
            build_line(&options),
            "-sdk iphonesimulator6.0 -configuration Debug -alltargets clean build CONFIGURATION_BUILD_DIR=/work/SampleApp/build/ TEST_HOST=build"
        );
    }

    #[test]
    fn test_otest_path_inside_sdk() {
        let paths = resolve(&RunnerOptions::default());
        assert_eq!(
            paths.otest_path(),
            "/Applications/Xcode.app/Contents/Developer/Platforms/iPhoneSimulator.platform/Developer/SDKs/iPhoneSimulator6.0.sdk/Developer/usr/bin/otest"
        );
    }

    #[test]
    fn test_suites_from_targets() {
        let targets = vec![
            "Tests/Models/FooTests.m".to_string(),
            "./a_test.m:1".to_string(),
            "./a_test.m:7".to_string(),
            "BarTests.m:testBaz".to_string(),
            "All".to_string(),
        ];
        assert_eq!(test_suites(&targets), "FooTests,a_test,BarTests/testBaz,All");
    }

    #[test]
    fn test_otest_environment_includes_test_variables() {
        let options = RunnerOptions {
            test_variables: Some("CFFIXED_USER_HOME=/tmp/home broken".into()),
            ..Default::default()
        };
        let paths = resolve(&options);
        let env = otest_environment(&options, &paths);
        let get = |k: &str| env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());

        assert_eq!(get("DYLD_LIBRARY_PATH").unwrap(), "/work/SampleApp/build/");
        assert_eq!(get("DYLD_ROOT_PATH").unwrap(), paths.sdk_root);
        assert_eq!(get("IPHONE_SIMULATOR_ROOT").unwrap(), paths.sdk_root);
        assert_eq!(get("DYLD_NO_FIX_PREBINDING").unwrap(), "YES");
        assert_eq!(get("CFFIXED_USER_HOME").unwrap(), "/tmp/home");
        assert!(get("broken").is_none());
    }

    #[test]
    fn test_command_words() {
        assert_eq!(
            command_words("xcrun xcodebuild"),
            ("xcrun".to_string(), vec!["xcodebuild".to_string()])
        );
        assert_eq!(command_words("otest"), ("otest".to_string(), vec![]));
    }

    #[tokio::test]
    async fn test_empty_targets_return_false_without_side_effects() {
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = XcodeRunner::new(
            RunnerOptions {
                xcodebuild_cmd: Some("/nonexistent/xcodebuild".into()),
                ..Default::default()
            },
            PathBuf::from("."),
            notifier.clone(),
        );
        assert!(!runner.run(&[], &RunOverrides::default()).await.unwrap());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_notifies_and_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = XcodeRunner::new(
            RunnerOptions {
                xcodebuild_cmd: Some("/nonexistent/xcodebuild".into()),
                ..Default::default()
            },
            dir.path().to_path_buf(),
            notifier.clone(),
        );
        let passed = runner
            .run(&["Tests".to_string()], &RunOverrides::default())
            .await
            .unwrap();
        assert!(!passed);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "Failed");
        assert_eq!(sent[0].image, Image::Failed);
    }

    #[tokio::test]
    async fn test_spawn_failure_without_notification_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = XcodeRunner::new(
            RunnerOptions {
                xcodebuild_cmd: Some("/nonexistent/xcodebuild".into()),
                notification: false,
                ..Default::default()
            },
            dir.path().to_path_buf(),
            notifier.clone(),
        );
        assert!(
            !runner
                .run(&["Tests".to_string()], &RunOverrides::default())
                .await
                .unwrap()
        );
        assert!(notifier.sent().is_empty());
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use std::fs;

        /// Runner whose xcodebuild exits with `build_exit` and whose otest
        /// prints `stderr` and exits with `otest_exit`.
        fn fake_runner(
            dir: &Path,
            build_exit: i32,
            stderr: &str,
            otest_exit: i32,
            notifier: Arc<RecordingNotifier>,
        ) -> XcodeRunner {
            let build = dir.join("xcodebuild.sh");
            fs::write(&build, format!("exit {}\n", build_exit)).unwrap();
            let otest = dir.join("otest.sh");
            fs::write(
                &otest,
                format!("cat >&2 <<'EOF'\n{}\nEOF\nexit {}\n", stderr, otest_exit),
            )
            .unwrap();

            XcodeRunner::new(
                RunnerOptions {
                    xcodebuild_cmd: Some(format!("sh {}", build.display())),
                    otest_cmd: Some(format!("sh {}", otest.display())),
                    ..Default::default()
                },
                dir.to_path_buf(),
                notifier,
            )
        }

        #[tokio::test]
        async fn test_passing_run() {
            let dir = tempfile::tempdir().unwrap();
            let notifier = Arc::new(RecordingNotifier::default());
            let runner = fake_runner(
                dir.path(),
                0,
                "Test Case '-[FooTests testA]' passed (0.001 seconds).",
                0,
                notifier.clone(),
            );
            let passed = runner
                .run(&["Tests".to_string()], &RunOverrides::default())
                .await
                .unwrap();
            assert!(passed);
            let sent = notifier.sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].image, Image::Success);
            assert!(sent[0].message.starts_with("1 examples, 0 failures"));
        }

        #[tokio::test]
        async fn test_failing_tests_with_exit_one() {
            let dir = tempfile::tempdir().unwrap();
            let notifier = Arc::new(RecordingNotifier::default());
            let runner = fake_runner(
                dir.path(),
                0,
                "Test Case '-[FooTests testA]' failed (0.001 seconds).",
                1,
                notifier.clone(),
            );
            let passed = runner
                .run(&["Tests".to_string()], &RunOverrides::default())
                .await
                .unwrap();
            assert!(!passed);
            let sent = notifier.sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].image, Image::Failed);
            assert!(sent[0].message.starts_with("1 examples, 1 failures"));
        }

        #[tokio::test]
        async fn test_build_failure_skips_otest() {
            let dir = tempfile::tempdir().unwrap();
            let notifier = Arc::new(RecordingNotifier::default());
            let runner = fake_runner(
                dir.path(),
                65,
                "Test Case '-[FooTests testA]' passed (0.001 seconds).",
                0,
                notifier.clone(),
            );
            let passed = runner
                .run(&["Tests".to_string()], &RunOverrides::default())
                .await
                .unwrap();
            assert!(!passed);
            let sent = notifier.sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].message, "Failed");
        }

        #[tokio::test]
        async fn test_unexpected_exit_code_is_a_failed_run() {
            let dir = tempfile::tempdir().unwrap();
            let notifier = Arc::new(RecordingNotifier::default());
            let runner = fake_runner(dir.path(), 0, "", 2, notifier.clone());
            let passed = runner
                .run(&["Tests".to_string()], &RunOverrides::default())
                .await
                .unwrap();
            assert!(!passed);
            let messages: Vec<String> = notifier.sent().into_iter().map(|n| n.message).collect();
            assert_eq!(messages.last().map(String::as_str), Some("Failed"));
        }
    }
}
