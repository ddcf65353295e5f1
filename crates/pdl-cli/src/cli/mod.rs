//! CLI for the PDL range downloader.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pdl_core::config::{self, PdlConfig};

use commands::{run_config, run_get, GetArgs};

/// Top-level CLI for the PDL range downloader.
#[derive(Debug, Parser)]
#[command(name = "pdl")]
#[command(about = "PDL: segmented HTTP range downloader with resume", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, split into concurrent ranges when the server allows it.
    Get(GetArgs),

    /// Print the config file path and the effective configuration.
    Config,
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match config::load_or_init() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("could not load config, using defaults: {:#}", e);
                PdlConfig::default()
            }
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get(args) => run_get(&cfg, args).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}
