//! Port interval type with validation and parsing.
//!
//! A `PortInterval` is an inclusive `start..=end` pair with `start <= end`.
//! Port 0 is accepted: the prober decides what a connect to it means.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An inclusive interval of TCP ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortInterval {
    start: u16,
    end: u16,
}

impl PortInterval {
    /// Create a new interval, rejecting `start > end`.
    pub fn new(start: u16, end: u16) -> Result<Self, ScanError> {
        if start > end {
            Err(ScanError::InvalidPortInterval { start, end })
        } else {
            Ok(Self { start, end })
        }
    }

    /// An interval containing a single port.
    pub const fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// First port of the interval.
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Last port of the interval (inclusive).
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports, `end - start + 1`. Computed in `usize` so the full
    /// `0-65535` interval does not overflow.
    pub const fn len(&self) -> usize {
        self.end as usize - self.start as usize + 1
    }

    /// A valid interval always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all ports, ascending.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl TryFrom<String> for PortInterval {
    type Error = ScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PortInterval> for String {
    fn from(value: PortInterval) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PortInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortInterval {
    type Err = ScanError;

    /// Parses `"80"` or `"1-1024"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| ScanError::InvalidConfig(format!("invalid port number: {}", part)))
        };

        match s.split_once('-') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => Ok(Self::single(parse(s)?)),
        }
    }
}
