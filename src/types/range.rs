//! IPv4 address ranges in CIDR notation.
//!
//! `AddressRange` expands a descriptor such as `192.168.1.0/24` into every
//! address of the block, ascending, network and broadcast addresses
//! included. Expansion is lazy: nothing is materialized until iterated, and
//! since the range is `Copy` it can be walked again at any time.

use crate::error::ScanError;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressRange {
    network: Ipv4Addr,
    prefix: u8,
}

impl AddressRange {
    /// Parse a CIDR descriptor. A bare address is treated as a `/32`.
    ///
    /// Host bits in the base address are masked off, so `10.0.0.7/30`
    /// covers `10.0.0.4` through `10.0.0.7`.
    pub fn parse(s: &str) -> Result<Self, ScanError> {
        let s = s.trim();
        let net: Ipv4Network = s
            .parse()
            .map_err(|e| ScanError::InvalidRange(format!("{}: {}", s, e)))?;

        Ok(Self {
            network: net.network(),
            prefix: net.prefix(),
        })
    }

    /// The first (network) address of the block.
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// The last (broadcast) address of the block.
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from((self.first() + self.len() - 1) as u32)
    }

    /// Number of addresses, always `2^(32 - prefix)`.
    pub fn len(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    /// A block always contains at least one address.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Lazily iterate every address in the block, ascending.
    pub fn iter(&self) -> Addresses {
        Addresses {
            next: self.first(),
            end: self.first() + self.len(),
        }
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.network))
    }
}

impl IntoIterator for AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = Addresses;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromStr for AddressRange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AddressRange {
    type Error = ScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AddressRange> for String {
    fn from(value: AddressRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Lazy iterator over the addresses of an [`AddressRange`].
///
/// Counters are kept in `u64` so a block ending at `255.255.255.255`
/// terminates without wrapping.
#[derive(Debug, Clone)]
pub struct Addresses {
    next: u64,
    end: u64,
}

impl Iterator for Addresses {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let addr = Ipv4Addr::from(self.next as u32);
        self.next += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Addresses {}
