//! One-shot commands: `ocguard run`, `ocguard all` and `ocguard clean`.

use anyhow::Result;
use console::style;
use ocguard::config::OcguardConfig;
use ocguard::guard::{Guard, RunStatus};
use ocguard::inspector::Inspector;
use ocguard::runner::XcodeRunner;
use ocguard::ui;
use std::path::Path;

/// Wire a guard to the xcodebuild/otest runner described by `config`.
pub fn build_guard(config: &OcguardConfig) -> Result<Guard<XcodeRunner>> {
    let runner = XcodeRunner::new(
        config.runner_options(),
        config.project_dir.clone(),
        config.notifier(),
    );
    Guard::new(config.guard_options(), runner)
}

/// Rewrite paths under `project_dir` relative to it.
///
/// File watchers report absolute paths while test roots are relative to the
/// project. Paths outside the project are passed through untouched.
pub fn project_relative(paths: &[String], project_dir: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|raw| match Path::new(raw).strip_prefix(project_dir) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
            _ => raw.clone(),
        })
        .collect()
}

pub async fn cmd_run(config: &OcguardConfig, paths: &[String]) -> Result<RunStatus> {
    let mut guard = build_guard(config)?;
    let paths = project_relative(paths, &config.project_dir);
    let status = guard.run_on_changes(&paths).await?;
    ui::print_status(status);
    Ok(status)
}

pub async fn cmd_all(config: &OcguardConfig) -> Result<RunStatus> {
    let mut guard = build_guard(config)?;
    let status = guard.run_all().await?;
    ui::print_status(status);
    Ok(status)
}

/// Print what a change batch would run, without running it.
pub fn cmd_clean(config: &OcguardConfig, paths: &[String]) -> Result<()> {
    let options = config.guard_options();
    let inspector = Inspector::new(options.test_paths, options.exclude.as_deref())?;
    let paths = project_relative(paths, &config.project_dir);
    ui::print_targets(&inspector.clean(&paths));

    if config.verbose {
        let excluded = inspector.excluded();
        if !excluded.is_empty() {
            println!("{}", style(format!("Excluded ({}):", excluded.len())).dim());
            for path in excluded {
                println!("  {}", style(path).dim());
            }
        }
    }
    Ok(())
}
