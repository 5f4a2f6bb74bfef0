use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "beacon", about = "Real-time portal notifications in your terminal")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Decode one notification frame and show the result
    Decode(commands::decode::DecodeArgs),
    /// Subscribe and print notifications until interrupted
    Listen(commands::listen::ListenArgs),
    /// Print the notification socket URL for a page location
    Resolve(commands::resolve::ResolveArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Decode(args) => commands::decode::run(args),
        Commands::Listen(args) => commands::listen::run(args).await,
        Commands::Resolve(args) => commands::resolve::run(args),
    }
}
