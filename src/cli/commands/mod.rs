//! CLI commands implementation.

mod compare;
mod config_cmd;
mod quote;
mod robots;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use staycompare::config::Config;
use staycompare::models::Channel;

#[derive(Parser)]
#[command(name = "staycompare")]
#[command(about = "Compare nightly rental rates across booking channels")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to discovered staycompare.{toml,yaml,json})
    #[arg(long, short = 'c', global = true, env = "STAYCOMPARE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and compare rates for a configured property
    Compare {
        /// Property id from the config's `properties` table
        property: String,

        /// First night of the stay (YYYY-MM-DD)
        #[arg(long)]
        check_in: NaiveDate,

        /// Departure date (YYYY-MM-DD)
        #[arg(long)]
        check_out: NaiveDate,

        /// Channels to query (repeatable; default: every listed channel)
        #[arg(long = "channel", short = 'C')]
        channels: Vec<Channel>,

        #[arg(long, default_value = "2")]
        adults: u32,

        #[arg(long, default_value = "0")]
        children: u32,

        #[arg(long, default_value = "0")]
        infants: u32,

        #[arg(long, default_value = "0")]
        pets: u32,

        /// Requested currency (ISO 4217)
        #[arg(long)]
        currency: Option<String>,

        /// Per-channel request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Ignore cached quotes
        #[arg(long)]
        no_cache: bool,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether robots.txt lets us fetch a URL
    Robots {
        url: String,

        /// Use this channel's ethics settings for identity and pacing
        #[arg(long)]
        channel: Option<Channel>,
    },

    /// Validate a quote JSON file and print the normalized quote
    ValidateQuote {
        /// JSON file (use - for stdin)
        file: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e)),
        None => Ok(Config::load().await),
    }
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).await?;

    match cli.command {
        Commands::Compare {
            property,
            check_in,
            check_out,
            channels,
            adults,
            children,
            infants,
            pets,
            currency,
            timeout_secs,
            no_cache,
            json,
        } => {
            let args = compare::CompareArgs {
                property,
                check_in,
                check_out,
                channels,
                party: staycompare::PartyComposition {
                    adults,
                    children,
                    infants,
                    pets,
                },
                currency,
                timeout_secs,
                no_cache,
                json,
            };
            compare::cmd_compare(config, args).await
        }
        Commands::Robots { url, channel } => robots::cmd_robots(&config, &url, channel).await,
        Commands::ValidateQuote { file } => quote::cmd_validate_quote(&file).await,
        Commands::Config { json } => config_cmd::cmd_config(&config, json),
    }
}
