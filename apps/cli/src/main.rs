//! govharvest CLI, a government document catalog harvester.
//!
//! Enumerates a collection's records for a date range, writes each record's
//! transcript and granule summary, and exports everything as one CSV table.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
