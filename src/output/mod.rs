//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of port and
//! host results. Every renderer writes to any `io::Write`; the `print_*`
//! helpers target stdout.

mod csv_format;
mod json_format;
mod plain;

pub use plain::{print_error, print_info, print_success, print_warning};

use crate::discovery::DiscoveryResults;
use crate::scanner::PortProbeResult;
use crate::types::{PortInterval, ScanTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::net::IpAddr;

/// Output format for results.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// A finished port scan, ready to print.
#[derive(Debug, Serialize)]
pub struct PortReport<'a> {
    pub target: &'a str,
    pub ip: IpAddr,
    pub interval: PortInterval,
    pub ports_scanned: usize,
    pub open_ports: usize,
    pub duration_ms: u64,
    /// Listed ports; closed ones are left out unless asked for.
    pub results: Vec<&'a PortProbeResult>,
}

impl<'a> PortReport<'a> {
    pub fn new(
        target: &'a ScanTarget,
        interval: PortInterval,
        results: &'a [PortProbeResult],
        show_closed: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            target: &target.original,
            ip: target.ip,
            interval,
            ports_scanned: results.len(),
            open_ports: results.iter().filter(|r| r.is_open()).count(),
            duration_ms,
            results: results
                .iter()
                .filter(|r| show_closed || r.is_open())
                .collect(),
        }
    }
}

/// Render a port report in `format`.
pub fn write_ports<W: Write>(out: &mut W, report: &PortReport<'_>, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_ports(out, report),
        OutputFormat::Json => json_format::write_json(out, report),
        OutputFormat::Csv => csv_format::write_ports(out, report),
    }
}

/// Render sweep results in `format`.
pub fn write_hosts<W: Write>(
    out: &mut W,
    results: &DiscoveryResults,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_hosts(out, results),
        OutputFormat::Json => json_format::write_json(out, results),
        OutputFormat::Csv => csv_format::write_hosts(out, results),
    }
}

/// Print a port report to stdout.
pub fn print_ports(report: &PortReport<'_>, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_ports(&mut out, report, format)
}

/// Print sweep results to stdout.
pub fn print_hosts(results: &DiscoveryResults, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_hosts(&mut out, results, format)
}

/// Hostnames as one cell.
fn join_hostnames(hostnames: &[String]) -> String {
    hostnames.join(", ")
}

/// Response time in milliseconds with two decimals.
fn format_ms(duration: std::time::Duration) -> String {
    format!("{:.2}", duration.as_micros() as f64 / 1000.0)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::discovery::{DiscoveryResults, HostProbeResult, HostState};
    use crate::scanner::{PortProbeResult, PortState, Protocol};
    use crate::types::{AddressRange, ScanTarget};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    pub fn target() -> ScanTarget {
        ScanTarget {
            original: "localhost".to_string(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    pub fn ports() -> Vec<PortProbeResult> {
        vec![
            PortProbeResult::new(21, PortState::Closed, Protocol::Tcp),
            PortProbeResult::new(22, PortState::Open, Protocol::Tcp),
            PortProbeResult::new(23, PortState::Closed, Protocol::Tcp),
        ]
    }

    pub fn hosts() -> DiscoveryResults {
        DiscoveryResults {
            range: AddressRange::parse("192.168.1.0/30").unwrap(),
            probes_sent: 4,
            send_failures: 0,
            hosts: vec![
                HostProbeResult {
                    address: Ipv4Addr::new(192, 168, 1, 1),
                    state: HostState::Up,
                    hostnames: vec!["router.lan".to_string(), "gw".to_string()],
                    response_time: Duration::from_micros(1250),
                },
                HostProbeResult {
                    address: Ipv4Addr::new(192, 168, 1, 2),
                    state: HostState::Up,
                    hostnames: vec!["N/A".to_string()],
                    response_time: Duration::from_millis(8),
                },
            ],
            duration_ms: 1003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortInterval;

    #[test]
    fn test_report_hides_closed_ports_by_default() {
        let target = fixtures::target();
        let ports = fixtures::ports();
        let interval = PortInterval::new(21, 23).unwrap();

        let report = PortReport::new(&target, interval, &ports, false, 10);
        assert_eq!(report.ports_scanned, 3);
        assert_eq!(report.open_ports, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].port, 22);

        let all = PortReport::new(&target, interval, &ports, true, 10);
        assert_eq!(all.results.len(), 3);
    }

    #[test]
    fn test_output_format_parses_from_settings() {
        let format: OutputFormat = serde_json::from_str("\"csv\"").unwrap();
        assert_eq!(format, OutputFormat::Csv);
        assert_eq!(format.to_string(), "csv");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(join_hostnames(&["a".to_string(), "b".to_string()]), "a, b");
        assert_eq!(format_ms(std::time::Duration::from_micros(1250)), "1.25");
    }
}
