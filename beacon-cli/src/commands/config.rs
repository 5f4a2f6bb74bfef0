use crate::config::ConfigLoader;
use anyhow::Result;
use beacon_core::ChannelConfig;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    println!("{}", render(config)?);
    Ok(())
}

/// Serialize for display with the token masked
fn render(mut config: ChannelConfig) -> Result<String> {
    if config.endpoint.token.is_some() {
        config.endpoint.token = Some("<redacted>".to_string());
    }
    Ok(toml::to_string_pretty(&config)?)
}

fn show_paths() -> Result<()> {
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    Ok(())
}
