//! Sweep - host discovery and TCP port probing.

use anyhow::{Context, Result};
use clap::Parser;
use sweep::cli::Cli;
use sweep::logging::init_logging;
use sweep::output;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    debug!(version = env!("CARGO_PKG_VERSION"), "sweep starting");

    let settings = cli.settings().context("failed to load settings")?;

    if let Err(e) = cli.execute(&settings).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}
