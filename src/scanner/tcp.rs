//! TCP connect prober.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API. Completes the full handshake, needs no privileges.

use crate::scanner::traits::{PortProber, PortState, Protocol};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// TCP connect prober for a single host.
pub struct TcpConnectProber {
    target: IpAddr,
    timeout: Duration,
}

impl TcpConnectProber {
    /// Create a new prober.
    ///
    /// # Arguments
    /// * `target` - Target IP address to probe
    /// * `timeout` - Connection timeout per port
    pub fn new(target: IpAddr, timeout: Duration) -> Self {
        Self { target, timeout }
    }
}

#[async_trait]
impl PortProber for TcpConnectProber {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, port: u16) -> PortState {
        let addr = SocketAddr::new(self.target, port);

        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                PortState::Open
            }
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "connect failed");
                PortState::Closed
            }
            Err(_) => {
                trace!(%addr, "connect timed out");
                PortState::Closed
            }
        }
    }
}
