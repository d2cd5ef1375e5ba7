//! Interactive host loop - `ocguard watch`.
//!
//! Change notifications arrive on stdin, one batch per line, so any file
//! watcher (`fswatch`, `watchexec`, an editor hook) can drive the guard.
//! Absolute paths under the project directory are made project-relative
//! before selection.

use anyhow::{Context, Result};
use console::style;
use ocguard::config::OcguardConfig;
use ocguard::ui::{self, icons::WATCH};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::run::{build_guard, project_relative};

/// One line of watch input.
#[derive(Debug, PartialEq, Eq)]
pub enum WatchCommand {
    /// Changed paths, whitespace-separated
    Changes(Vec<String>),
    /// Empty line
    RunAll,
    Reload,
    Quit,
}

impl WatchCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => WatchCommand::RunAll,
            "reload" => WatchCommand::Reload,
            "quit" | "exit" => WatchCommand::Quit,
            paths => WatchCommand::Changes(paths.split_whitespace().map(String::from).collect()),
        }
    }
}

pub async fn cmd_watch(config: &OcguardConfig) -> Result<()> {
    let mut guard = build_guard(config)?;

    println!(
        "{}{}",
        WATCH,
        style("Watching. Enter changed paths, an empty line to run all, `reload` or `quit`.")
            .dim()
    );
    match guard.start().await {
        Ok(status) => ui::print_status(status),
        Err(e) => report_error(&e),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let result = match WatchCommand::parse(&line) {
            WatchCommand::Quit => break,
            WatchCommand::Reload => {
                guard.reload();
                println!("{}", style("Forgot remembered failures").dim());
                continue;
            }
            WatchCommand::RunAll => guard.run_all().await,
            WatchCommand::Changes(paths) => {
                let paths = project_relative(&paths, &config.project_dir);
                guard.run_on_changes(&paths).await
            }
        };
        match result {
            Ok(status) => ui::print_status(status),
            Err(e) => report_error(&e),
        }
    }

    tracing::info!("watch input closed");
    Ok(())
}

fn report_error(e: &anyhow::Error) {
    tracing::error!(error = %e, "guard operation failed");
    eprintln!("{} {:#}", style("Error:").red().bold(), e);
}
