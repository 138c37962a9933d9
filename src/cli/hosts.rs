//! Hosts subcommand implementation.
//!
//! Handles `sweep hosts` for ICMP host discovery.

use crate::cli::{is_root, OutputFormat};
use crate::config::AppSettings;
use crate::discovery::{discover_hosts_with, DnsReverseResolver, IcmpProber};
use crate::error::CliResult;
use crate::output;
use crate::types::AddressRange;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Find responsive hosts in an address range.
#[derive(Parser, Debug)]
pub struct HostsCommand {
    /// Address range in CIDR notation (a bare address means /32)
    #[arg(short = 'n', long, default_value = "192.168.0.0/24")]
    pub network: String,

    /// Seconds to wait for echo replies [default: from settings, 20]
    #[arg(short = 't', long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Cap on echo probes in flight (unbounded when unset)
    #[arg(long, value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

impl HostsCommand {
    /// Execute the hosts command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> CliResult<()> {
        let range = AddressRange::parse(&self.network)?;
        let format = self.output.unwrap_or(settings.output_format);

        let mut config = settings.discovery_config();
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if self.max_in_flight.is_some() {
            config = config.with_max_in_flight(self.max_in_flight);
        }

        if !is_root() {
            output::print_warning(
                "host discovery may need root/sudo or CAP_NET_RAW for ICMP sockets.",
            );
        }

        let prober = Arc::new(IcmpProber::new()?);
        let resolver = Arc::new(DnsReverseResolver::new());

        let spinner = (!quiet && format == OutputFormat::Plain).then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
            {
                pb.set_style(style);
            }
            pb.set_message(format!("sweeping {} ({} addresses)", range, range.len()));
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let outcome = discover_hosts_with(range, &config, prober, resolver).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        output::print_hosts(&outcome?, format)?;
        Ok(())
    }
}
