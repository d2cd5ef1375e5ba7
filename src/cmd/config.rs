//! Configuration view and validation commands - `ocguard config`.

use anyhow::{Context, Result};
use console::style;
use ocguard::config::{CONFIG_FILE, OcguardConfig, OcguardToml};
use ocguard::ui::icons::SPARKLE;

use super::super::ConfigCommands;

pub fn cmd_config(config: &OcguardConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("ocguard Configuration");
            println!("=====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found at {}", CONFIG_FILE, config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let content =
                toml::to_string_pretty(&config.toml).context("Failed to serialize configuration")?;
            println!("{}", content.trim_end());
            println!();

            // Values after env and CLI overrides
            let runner = config.runner_options();
            let guard = config.guard_options();
            println!("Effective values (with env/CLI overrides):");
            println!(
                "  xcodebuild = \"{}\"",
                runner.xcodebuild_cmd.as_deref().unwrap_or("xcodebuild")
            );
            println!(
                "  otest = \"{}\"",
                runner.otest_cmd.as_deref().unwrap_or("<sdk otest>")
            );
            println!("  verbose = {}", runner.verbose);
            println!("  notification = {}", runner.notification);
            println!("  focus_on_failed = {}", guard.focus_on_failed);
            println!("  focus_file = \"{}\"", guard.focus_file.display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", style(warning).yellow());
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.config_dir).with_context(|| {
                format!("Failed to create {}", config.config_dir.display())
            })?;
            OcguardToml::default().save(&config_path)?;

            println!("{}Created {} at {}", SPARKLE, CONFIG_FILE, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [guard] test_paths, exclude, focus_on_failed");
            println!("  - [runner] test_bundle, project or workspace + scheme, sdk");
            println!("  - [run_all] overrides for full runs");
            println!("  - [notification] command");
            println!();
        }
    }

    Ok(())
}
