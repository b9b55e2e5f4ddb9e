//! `crosspost` command line: publish to LinkedIn and Twitter from a config file.
//!
//! Results are printed to stdout as JSON; logs go to the rolling file sink
//! (and stderr when `logging.stderr` is set).

mod linkedin;
mod twitter;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crosspost_common::observability::{LogConfig, init_logging};
use crosspost_config::{CrosspostConfig, CrosspostConfigLoader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crosspost")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML config file; may be absent when everything comes from `CROSSPOST__*` variables.
    #[arg(long, short, env = "CROSSPOST_CONFIG", default_value = "crosspost.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// LinkedIn token exchange and shares.
    #[command(subcommand)]
    Linkedin(linkedin::LinkedinCommand),

    /// Twitter credential check, tweets and raw API calls.
    #[command(subcommand)]
    Twitter(twitter::TwitterCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Env wins over the file.
    let cfg: CrosspostConfig = CrosspostConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    init_logging(LogConfig::from(&cfg.logging))?;
    tracing::debug!(config = %cli.config.display(), version = ?cfg.version, "crosspost.start");

    let output = match cli.command {
        Commands::Linkedin(cmd) => linkedin::run(&cfg, cmd).await?,
        Commands::Twitter(cmd) => twitter::run(&cfg, cmd).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
