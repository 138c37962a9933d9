//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::{format_ms, join_hostnames, PortReport};
use crate::discovery::DiscoveryResults;
use crate::scanner::PortState;
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

fn write_banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                    {} {}", style("Sweep").cyan().bold(), title)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

/// Write a port report as a table.
pub fn write_ports<W: Write>(out: &mut W, report: &PortReport<'_>) -> io::Result<()> {
    write_banner(out, "Port Scan")?;

    writeln!(out, "  {} {}", style("Target:").bold(), report.target)?;
    writeln!(out, "  {} {}", style("IP Address:").bold(), report.ip)?;
    writeln!(out, "  {} {}", style("Ports:").bold(), report.interval)?;
    writeln!(out)?;
    writeln!(
        out,
        "  {} {} ports probed in {:.2}s, {} open",
        style("Statistics:").bold(),
        report.ports_scanned,
        report.duration_ms as f64 / 1000.0,
        style(report.open_ports).green().bold()
    )?;
    writeln!(out)?;

    if report.results.is_empty() {
        writeln!(out, "  {}", style("No open ports found.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:>6}  {:^10}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("PROTO").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for result in &report.results {
            let state_style = match result.state {
                PortState::Open => Style::new().green().bold(),
                PortState::Closed => Style::new().red(),
            };
            writeln!(
                out,
                "  {:>6}  {:^10}  {}",
                result.port,
                state_style.apply_to(result.state.to_string()),
                result.protocol
            )?;
        }
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

/// Write responsive hosts as a table.
pub fn write_hosts<W: Write>(out: &mut W, results: &DiscoveryResults) -> io::Result<()> {
    write_banner(out, "Host Discovery")?;

    writeln!(
        out,
        "  {} {} ({} - {})",
        style("Range:").bold(),
        results.range,
        results.range.network(),
        results.range.broadcast()
    )?;
    writeln!(
        out,
        "  {} {} addresses probed in {:.2}s, {} up",
        style("Statistics:").bold(),
        results.probes_sent,
        results.duration_ms as f64 / 1000.0,
        style(results.hosts.len()).green().bold()
    )?;
    if results.send_failures > 0 {
        writeln!(
            out,
            "  {} {} addresses could not be reached (see log)",
            style("Not sent:").yellow().bold(),
            results.send_failures
        )?;
    }
    writeln!(out)?;

    if results.hosts.is_empty() {
        writeln!(out, "  {}", style("No hosts responded.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:<15}  {:>10}  {}",
            style("ADDRESS").bold(),
            style("RTT (ms)").bold(),
            style("HOSTNAMES").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for host in &results.hosts {
            writeln!(
                out,
                "  {:<15}  {:>10}  {}",
                host.address,
                format_ms(host.response_time),
                truncate_string(&join_hostnames(&host.hostnames), 40)
            )?;
        }
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum number of characters, adding an ellipsis.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
