use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ocguard::config::OcguardConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "ocguard")]
#[command(version, about = "Continuous OCUnit test runner")]
pub struct Cli {
    /// Echo all test output and log debug detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root; test paths and changed paths are relative to it
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// After a failure, rerun only the failing tests recorded by the last run
    #[arg(long, global = true)]
    pub focus: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run all tests, then run tests for changed paths read from stdin
    Watch,
    /// Run the tests affected by the given changed paths
    Run {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Clean-build and run the whole test bundle
    All,
    /// Show which test targets the given paths select
    Clean { paths: Vec<String> },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default ocguard.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = OcguardConfig::with_cli_args(project_dir, cli.verbose, cli.focus)?;
    std::env::set_current_dir(&config.project_dir).with_context(|| {
        format!("Failed to enter project directory {}", config.project_dir.display())
    })?;

    let status = match &cli.command {
        Commands::Watch => {
            cmd::cmd_watch(&config).await?;
            None
        }
        Commands::Run { paths } => Some(cmd::cmd_run(&config, paths).await?),
        Commands::All => Some(cmd::cmd_all(&config).await?),
        Commands::Clean { paths } => {
            cmd::cmd_clean(&config, paths)?;
            None
        }
        Commands::Config { command } => {
            cmd::cmd_config(&config, command.clone())?;
            None
        }
    };

    if status.is_some_and(|s| s.is_failure()) {
        std::process::exit(1);
    }
    Ok(())
}
