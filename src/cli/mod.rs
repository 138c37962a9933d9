//! CLI subcommand definitions and handlers.
//!
//! - `sweep hosts` - ICMP sweep of an address range
//! - `sweep ports` - TCP connect scan of one host
//! - `sweep serve` - line echo test server
//! - `sweep client` - interactive client for the test server

mod client;
mod hosts;
mod ports;
mod serve;

pub use client::ClientCommand;
pub use hosts::HostsCommand;
pub use ports::PortsCommand;
pub use serve::ServeCommand;

pub use crate::output::OutputFormat;

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sweep - find live hosts and open ports.
///
/// Discovers responsive hosts with ICMP echo, probes TCP ports with
/// connect attempts, and ships a small echo server for testing both.
#[derive(Parser, Debug)]
#[command(name = "sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Host discovery and TCP port probing", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH", env = "SWEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find responsive hosts in an address range
    #[command(alias = "h")]
    Hosts(HostsCommand),

    /// Probe a range of TCP ports on one host
    #[command(alias = "p")]
    Ports(PortsCommand),

    /// Start a line echo server for testing
    Serve(ServeCommand),

    /// Talk to a line server from the terminal
    Client(ClientCommand),
}

impl Cli {
    /// Load settings from `--config` or the default location.
    pub fn settings(&self) -> CliResult<AppSettings> {
        let settings = match &self.config {
            Some(path) => AppSettings::load_from(path)?,
            None => AppSettings::load()?,
        };
        Ok(settings)
    }

    /// Run the selected subcommand.
    pub async fn execute(&self, settings: &AppSettings) -> CliResult<()> {
        match &self.command {
            Commands::Hosts(cmd) => cmd.execute(settings, self.quiet).await,
            Commands::Ports(cmd) => cmd.execute(settings, self.quiet).await,
            Commands::Serve(cmd) => cmd.execute(settings).await,
            Commands::Client(cmd) => cmd.execute(settings).await,
        }
    }
}

/// Check if running with root/admin privileges.
pub(crate) fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
