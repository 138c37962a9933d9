//! CSV output formatting.

use super::{format_ms, join_hostnames, PortReport};
use crate::discovery::DiscoveryResults;
use std::io::{self, Write};

/// Write listed port results as CSV.
pub fn write_ports<W: Write>(out: &mut W, report: &PortReport<'_>) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["port", "state", "protocol"])?;
    for result in &report.results {
        wtr.write_record([
            result.port.to_string(),
            result.state.to_string(),
            result.protocol.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write responsive hosts as CSV.
pub fn write_hosts<W: Write>(out: &mut W, results: &DiscoveryResults) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["address", "state", "hostnames", "response_time_ms"])?;
    for host in &results.hosts {
        wtr.write_record([
            host.address.to_string(),
            host.state.to_string(),
            join_hostnames(&host.hostnames),
            format_ms(host.response_time),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
