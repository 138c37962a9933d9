//! Port prober trait abstraction.
//!
//! Defines the interface the port probe engine drives, so the engine can be
//! exercised with instrumented probers as well as real TCP connects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// A connection was established.
    Open,
    /// Refused, timed out or unreachable.
    Closed,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Transport protocol a prober speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// Outcome of probing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortProbeResult {
    /// The port number that was probed.
    pub port: u16,
    /// State determined by the probe.
    pub state: PortState,
    /// Protocol used for the probe.
    pub protocol: Protocol,
}

impl PortProbeResult {
    /// Create a new port result.
    pub fn new(port: u16, state: PortState, protocol: Protocol) -> Self {
        Self {
            port,
            state,
            protocol,
        }
    }

    /// Check if the port is open.
    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Trait for port prober implementations.
///
/// A prober must never fail: every network error is mapped onto a
/// [`PortState`]. The engine owns concurrency; a prober handles one port.
///
/// # Example
///
/// ```ignore
/// use sweep::scanner::{PortProber, PortState};
///
/// async fn is_open<P: PortProber>(prober: &P, port: u16) -> bool {
///     prober.probe(port).await == PortState::Open
/// }
/// ```
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Protocol reported in results.
    fn protocol(&self) -> Protocol;

    /// Probe a single port.
    async fn probe(&self, port: u16) -> PortState;
}
