//! nodecatalog CLI — builds the n8n node catalogue snapshot.
//!
//! Merges the core node listing with community packages discovered across
//! several public sources and writes `nodes.json`.

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
