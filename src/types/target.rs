//! Host targets for the port prober.
//!
//! A target is whatever the caller typed (`localhost`, `10.0.0.5`,
//! `example.com`) plus the address it resolved to. Resolution happens once
//! per scan, not once per port.

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A single scan target that has been resolved to an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    /// The original input (hostname or IP string).
    pub original: String,
    /// The resolved IP address.
    pub ip: IpAddr,
}

impl ScanTarget {
    /// Create a new scan target.
    pub fn new(original: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            original: original.into(),
            ip,
        }
    }

    /// Resolve a hostname or IP literal.
    ///
    /// IP literals are taken as-is. Names go through the resolver, which
    /// consults the hosts file first, so `localhost` works offline.
    pub async fn resolve(host: &str) -> ScanResult<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ScanError::DnsResolution("empty host".to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Self::new(host, ip));
        }

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

        let response = resolver.lookup_ip(host).await.map_err(|e| {
            ScanError::DnsResolution(format!("failed to resolve '{}': {}", host, e))
        })?;

        // Prefer IPv4.
        let ips: Vec<IpAddr> = response.iter().collect();
        let ip = ips
            .iter()
            .copied()
            .find(IpAddr::is_ipv4)
            .or_else(|| ips.first().copied())
            .ok_or_else(|| {
                ScanError::DnsResolution(format!("no IP addresses found for '{}'", host))
            })?;

        Ok(Self::new(host, ip))
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original == self.ip.to_string() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} ({})", self.original, self.ip)
        }
    }
}
