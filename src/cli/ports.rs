//! Ports subcommand implementation.
//!
//! Handles `sweep ports` for TCP connect scanning.

use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output::{self, PortReport};
use crate::scanner::{scan_ports_with, TcpConnectProber};
use crate::types::{PortInterval, ScanTarget};
use clap::Parser;
use console::style;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Probe a range of TCP ports on one host.
#[derive(Parser, Debug)]
pub struct PortsCommand {
    /// Host name or IP address to probe
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// First port of the interval
    #[arg(short, long, default_value_t = 1)]
    pub start: u16,

    /// Last port of the interval (inclusive)
    #[arg(short, long, default_value_t = 1024)]
    pub end: u16,

    /// List closed ports too
    #[arg(short, long)]
    pub all: bool,

    /// Concurrent connect attempts, at most 50 [default: from settings]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Connect timeout in milliseconds [default: from settings, 10000]
    #[arg(short = 't', long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

impl PortsCommand {
    /// Execute the ports command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let interval = PortInterval::new(self.start, self.end)?;
        let format = self.output.unwrap_or(settings.output_format);

        let mut config = settings.port_scan_config();
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }

        let target = ScanTarget::resolve(&self.host).await?;

        if !quiet && format == OutputFormat::Plain {
            println!();
            println!(
                "{} {} v{}",
                style("Starting").cyan(),
                style("Sweep").cyan().bold(),
                env!("CARGO_PKG_VERSION")
            );
            println!("{} Target: {}", style("•").dim(), style(&target).white().bold());
            println!(
                "{} Probing {} ports, {} at a time...",
                style("•").dim(),
                style(interval.len()).white().bold(),
                config.concurrency
            );
            println!();
        }

        let started = Instant::now();
        let prober = Arc::new(TcpConnectProber::new(target.ip, config.timeout));
        let results = scan_ports_with(prober, interval, &config).await?;
        let elapsed = started.elapsed().as_millis() as u64;

        let report = PortReport::new(&target, interval, &results, self.all, elapsed);
        output::print_ports(&report, format)?;
        Ok(())
    }
}
