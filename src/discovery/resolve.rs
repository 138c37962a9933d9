//! Reverse name lookup for discovered hosts.
//!
//! Lookups are best effort: any failure, timeout or empty answer becomes
//! the single placeholder name `N/A`.

use crate::error::{ScanError, ScanResult};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::time::timeout;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;
use tracing::debug;

/// Placeholder used when an address has no resolvable name.
pub const NO_HOSTNAME: &str = "N/A";

/// Upper bound on a single reverse lookup.
pub const REVERSE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Anything that can map an address back to names.
#[async_trait]
pub trait ReverseResolver: Send + Sync {
    async fn reverse(&self, addr: Ipv4Addr) -> ScanResult<Vec<String>>;
}

/// PTR lookups through `trust-dns-resolver`.
pub struct DnsReverseResolver {
    resolver: TokioAsyncResolver,
}

impl DnsReverseResolver {
    /// Use the system resolver configuration, falling back to the
    /// resolver's built-in defaults when it cannot be read.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!(error = %e, "system resolver config unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

impl Default for DnsReverseResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReverseResolver for DnsReverseResolver {
    async fn reverse(&self, addr: Ipv4Addr) -> ScanResult<Vec<String>> {
        let lookup = self
            .resolver
            .reverse_lookup(IpAddr::V4(addr))
            .await
            .map_err(|e| ScanError::DnsResolution(format!("{}: {}", addr, e)))?;

        Ok(lookup
            .iter()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .collect())
    }
}

/// Resolve `addr` to its names, never failing.
pub async fn hostnames_for<R>(resolver: &R, addr: Ipv4Addr) -> Vec<String>
where
    R: ReverseResolver + ?Sized,
{
    match timeout(REVERSE_LOOKUP_TIMEOUT, resolver.reverse(addr)).await {
        Ok(Ok(names)) if !names.is_empty() => names,
        Ok(Ok(_)) => vec![NO_HOSTNAME.to_string()],
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "reverse lookup failed");
            vec![NO_HOSTNAME.to_string()]
        }
        Err(_) => {
            debug!(%addr, "reverse lookup timed out");
            vec![NO_HOSTNAME.to_string()]
        }
    }
}
