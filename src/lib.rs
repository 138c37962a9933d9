//! # Sweep - Host Discovery and Port Probing
//!
//! Sweep finds responsive hosts on a network with ICMP echo and probes TCP
//! ports on a host with plain connect attempts.
//!
//! ## Features
//!
//! - **Host discovery**: ICMP echo sweep over a CIDR range with reverse
//!   name lookup of every responder
//! - **Port probing**: bounded-concurrency TCP connect scan, results sorted
//!   by port
//! - **Echo server**: a line-oriented TCP test server and client
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use sweep::scanner::scan_ports;
//! use sweep::discovery::discover_hosts;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sweep::ScanError> {
//!     for result in scan_ports("127.0.0.1", 20, 25).await? {
//!         println!("{} {}", result.port, result.state);
//!     }
//!
//!     let sweep = discover_hosts("192.168.1.0/24", 5).await?;
//!     for host in sweep.hosts {
//!         println!("{} {:?}", host.address, host.hostnames);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Address ranges, port intervals and resolved targets
//! - [`scanner`] - Port probe engine and the `PortProber` trait
//! - [`discovery`] - Host discovery engine (sender, receiver, aggregator)
//! - [`aggregate`] - Result ordering and de-duplication
//! - [`echo`] - Test server and client
//! - [`config`] - Settings management
//! - [`output`] - Output formatting utilities
//! - [`error`] - Error types

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod echo;
pub mod error;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use discovery::{discover_hosts, DiscoveryResults, HostProbeResult};
pub use error::{CliError, ScanError};
pub use scanner::{scan_ports, PortProbeResult, PortState};
pub use types::{AddressRange, PortInterval, ScanTarget};
