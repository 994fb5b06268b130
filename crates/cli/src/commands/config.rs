//! Config Commands

use anyhow::{Context, Result};
use clap::Subcommand;
use snapmatch_engine::EngineConfig;
use std::path::Path;

use crate::output::{print_info, print_success};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

pub async fn execute(cmd: ConfigCommands, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            EngineConfig::default()
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Configuration written to {}", path.display()));
        }

        ConfigCommands::Show => {
            let config = EngineConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            if !path.exists() {
                print_info(&format!("{} not found, showing defaults", path.display()));
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
