//! CLI for the wxfetch station-data fetcher.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run_cache, run_fetch};

/// Top-level CLI for wxfetch.
#[derive(Debug, Parser)]
#[command(name = "wxfetch")]
#[command(about = "wxfetch: windowed fetch-and-cache of station weather data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Create a fetch job and poll it until it completes.
    Run {
        /// Station identifier (e.g. 89064).
        #[arg(long)]
        station: String,
        /// Range start, RFC 3339 or YYYY-MM-DD (UTC).
        #[arg(long)]
        start: String,
        /// Range end (exclusive), RFC 3339 or YYYY-MM-DD (UTC).
        #[arg(long)]
        end: String,
        /// Window unit: "month" or "day".
        #[arg(long, default_value = "month")]
        unit: String,
        /// Poll interval in seconds.
        #[arg(long, default_value = "1", value_name = "SECS")]
        interval: u64,
    },

    /// List durable cache entries for a station.
    Cache {
        /// Station identifier.
        #[arg(long)]
        station: String,
        /// Optional range start filter (requires --end).
        #[arg(long)]
        start: Option<String>,
        /// Optional range end filter (requires --start).
        #[arg(long)]
        end: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            CliCommand::Run {
                station,
                start,
                end,
                unit,
                interval,
            } => run_fetch(&station, &start, &end, &unit, interval).await,
            CliCommand::Cache {
                station,
                start,
                end,
            } => run_cache(&station, start.as_deref(), end.as_deref()).await,
        }
    }
}
