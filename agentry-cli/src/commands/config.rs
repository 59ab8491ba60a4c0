//! Configuration commands

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{AgentryConfig, ConfigLoader};

/// Configuration arguments
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file locations
    Path,
}

pub fn run(args: ConfigArgs, config: &AgentryConfig) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigCommands::Path => {
            println!("User:    {}", ConfigLoader::user_config_path().display());
            println!("Project: {}", ConfigLoader::project_config_path().display());
        }
    }
    Ok(())
}
