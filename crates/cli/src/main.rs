//! SnapMatch CLI - Main Entry Point

use anyhow::Context;
use clap::{Parser, Subcommand};
use snapmatch_cli::commands::{check, config};
use snapmatch_cli::output;
use snapmatch_engine::EngineConfig;
use std::path::PathBuf;

/// SnapMatch CLI - visual checkpoints with retrying matches
#[derive(Parser)]
#[command(name = "snapmatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "SNAPMATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Match an image against its baseline
    Check(check::CheckArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);

    match cli.command {
        Commands::Config(cmd) => config::execute(cmd, &config_path).await?,
        Commands::Check(args) => {
            let engine_config = EngineConfig::load(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?;
            let matched = check::execute(args, &engine_config, cli.format).await?;
            if !matched {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("SnapMatch CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
