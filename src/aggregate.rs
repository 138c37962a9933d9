//! Result aggregation shared by both engines.
//!
//! Port results are stably sorted by port. Host results are accumulated as
//! a set keyed by address.

use crate::discovery::HostProbeResult;
use crate::scanner::PortProbeResult;
use std::collections::btree_map::{BTreeMap, Entry};
use std::net::Ipv4Addr;

/// Sort port results ascending by port. The sort is stable.
pub fn sort_port_results(results: &mut [PortProbeResult]) {
    results.sort_by_key(|r| r.port);
}

/// Host results keyed by address; the first record for an address wins.
#[derive(Debug, Default)]
pub struct HostSet {
    hosts: BTreeMap<Ipv4Addr, HostProbeResult>,
}

impl HostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result. Returns `false` if the address was already present,
    /// in which case the existing record is kept.
    pub fn insert(&mut self, result: HostProbeResult) -> bool {
        match self.hosts.entry(result.address) {
            Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Consume the set, yielding results ascending by address.
    pub fn into_vec(self) -> Vec<HostProbeResult> {
        self.hosts.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::HostState;
    use crate::scanner::{PortState, Protocol};
    use std::time::Duration;

    fn host(last: u8, rtt_ms: u64) -> HostProbeResult {
        HostProbeResult {
            address: Ipv4Addr::new(10, 0, 0, last),
            state: HostState::Up,
            hostnames: vec!["N/A".to_string()],
            response_time: Duration::from_millis(rtt_ms),
        }
    }

    #[test]
    fn test_sort_port_results() {
        let mut results = vec![
            PortProbeResult::new(82, PortState::Closed, Protocol::Tcp),
            PortProbeResult::new(80, PortState::Closed, Protocol::Tcp),
            PortProbeResult::new(81, PortState::Open, Protocol::Tcp),
        ];
        sort_port_results(&mut results);
        let ports: Vec<u16> = results.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![80, 81, 82]);
    }

    #[test]
    fn test_host_set_deduplicates_by_address() {
        let mut set = HostSet::new();
        assert!(set.insert(host(3, 10)));
        assert!(set.insert(host(1, 20)));
        assert!(!set.insert(host(3, 99)));

        assert_eq!(set.len(), 2);

        let hosts = set.into_vec();
        assert_eq!(hosts[0].address, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(hosts[1].address, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(hosts[1].response_time, Duration::from_millis(10));
    }
}
