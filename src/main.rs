use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use marketpulse::core::log::init_logging;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for marketpulse::AppCommand {
    fn from(cmd: Commands) -> marketpulse::AppCommand {
        match cmd {
            Commands::Quotes => marketpulse::AppCommand::Quotes,
            Commands::Toggle { symbols } => marketpulse::AppCommand::Toggle(symbols),
            Commands::Live => marketpulse::AppCommand::Live,
            Commands::Refresh { symbols } => marketpulse::AppCommand::Refresh(symbols),
            Commands::Watch { interval } => {
                marketpulse::AppCommand::Watch(Duration::from_secs(interval))
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the watchlist with live quotes
    Quotes,
    /// Add or remove symbols from the watchlist
    Toggle {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Turn live quotes on or off
    Live,
    /// Bypass the cache and fetch fresh quotes
    Refresh {
        /// Only refresh these symbols
        symbols: Vec<String>,
    },
    /// Keep refreshing quotes until interrupted
    Watch {
        /// Seconds between passes
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => marketpulse::cli::setup::setup(),
        Some(cmd) => marketpulse::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
