//! Host discovery engine.
//!
//! An ICMP echo sweep over an address range, run as three tasks:
//!
//! - the **sender** sends one echo request per address and waits for
//!   replies within the reply window;
//! - the **receiver** attaches reverse-lookup names to each reply;
//! - the **aggregator** (the caller's task) collects results into a set.
//!
//! Completion is a two-step handshake. The sender fires
//! [`sweep::ProbingComplete`] once every request has resolved; the receiver
//! answers with [`sweep::DrainingComplete`] once every reply it was handed
//! has been forwarded. The aggregator only returns after the second signal,
//! so no reply that arrived before the deadline is lost. A guard timer turns
//! a handshake that never completes into an error instead of a hang.

pub mod icmp;
pub mod resolve;
pub mod sweep;

use crate::aggregate::HostSet;
use crate::error::{ScanError, ScanResult};
use crate::types::AddressRange;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use icmp::{EchoProber, IcmpProber, PendingEcho};
pub use resolve::{DnsReverseResolver, ReverseResolver, NO_HOSTNAME};
pub use sweep::{DrainingComplete, EchoReply, ProbingComplete, ReplyWindow};

/// Extra time the aggregator waits past the sweep deadline for the
/// completion handshake. Covers reverse lookups still in flight.
pub const HANDSHAKE_GRACE: Duration = Duration::from_secs(10);

/// State of a discovered host. Only responsive hosts are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostState::Up => write!(f, "up"),
        }
    }
}

/// One host that answered the sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostProbeResult {
    pub address: std::net::Ipv4Addr,
    pub state: HostState,
    /// Reverse-lookup names, or `["N/A"]` when there are none.
    pub hostnames: Vec<String>,
    #[serde(rename = "response_time_ms", serialize_with = "duration_ms")]
    pub response_time: Duration,
}

fn duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_micros() as f64 / 1000.0)
}

/// Deadlines further out than this are treated as "never".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Tuning for a sweep.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long to wait for replies. Must be non-zero.
    pub timeout: Duration,
    /// Cap on requests in flight; `None` sends to the whole range at once
    /// and all replies share one deadline. With a cap, each request gets
    /// the full `timeout` from the moment it is sent.
    pub max_in_flight: Option<usize>,
    /// See [`HANDSHAKE_GRACE`].
    pub handshake_grace: Duration,
}

impl DiscoveryConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_in_flight: None,
            handshake_grace: HANDSHAKE_GRACE,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.max_in_flight = max_in_flight.map(|n| n.max(1));
        self
    }

    /// Reply window for a sweep starting at `started`.
    pub fn reply_window(&self, started: Instant) -> ReplyWindow {
        match self.max_in_flight {
            None => ReplyWindow::Shared(
                started
                    .checked_add(self.timeout)
                    .unwrap_or_else(|| started + FAR_FUTURE),
            ),
            Some(_) => ReplyWindow::PerRequest(self.timeout),
        }
    }

    /// How long the aggregator waits for the handshake over `addresses`.
    ///
    /// With a cap, requests go out in rounds of at most `max_in_flight`,
    /// each round lasting up to `timeout`.
    pub fn handshake_guard(&self, addresses: u64) -> Duration {
        let probing = match self.max_in_flight {
            None => self.timeout,
            Some(limit) => {
                let rounds = addresses.div_ceil(limit.max(1) as u64).max(1);
                self.timeout
                    .saturating_mul(u32::try_from(rounds).unwrap_or(u32::MAX))
            }
        };
        probing.saturating_add(self.handshake_grace)
    }

    fn validate(&self) -> ScanResult<()> {
        if self.timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "discovery timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResults {
    pub range: AddressRange,
    /// Echo requests that went out.
    pub probes_sent: u64,
    /// Addresses whose request could not be sent.
    pub send_failures: u64,
    /// Responsive hosts, ascending by address.
    pub hosts: Vec<HostProbeResult>,
    pub duration_ms: u64,
}

/// Sweep `range` with ICMP echo, waiting up to `timeout_secs` for replies.
///
/// # Errors
/// `InvalidRange` for a malformed descriptor, `InvalidConfig` for a zero
/// timeout, `PermissionDenied` when ICMP sockets cannot be opened and
/// `Handshake`/`HandshakeTimeout` if the sweep tasks fail to finish.
pub async fn discover_hosts(range: &str, timeout_secs: u64) -> ScanResult<DiscoveryResults> {
    let range = AddressRange::parse(range)?;
    let config = DiscoveryConfig::new(Duration::from_secs(timeout_secs));
    config.validate()?;

    let prober = Arc::new(IcmpProber::new()?);
    let resolver = Arc::new(DnsReverseResolver::new());
    discover_hosts_with(range, &config, prober, resolver).await
}

/// Run a sweep with explicit probing and naming back ends.
pub async fn discover_hosts_with<E, R>(
    range: AddressRange,
    config: &DiscoveryConfig,
    prober: Arc<E>,
    resolver: Arc<R>,
) -> ScanResult<DiscoveryResults>
where
    E: EchoProber + ?Sized + 'static,
    R: ReverseResolver + ?Sized + 'static,
{
    config.validate()?;

    let started = Instant::now();
    let window = config.reply_window(started);
    let guard = config.handshake_guard(range.len());
    info!(
        %range,
        addresses = range.len(),
        timeout_secs = config.timeout.as_secs_f64(),
        "starting host discovery"
    );

    let (reply_tx, reply_rx) = mpsc::channel(1);
    let (result_tx, result_rx) = mpsc::channel(1);
    let (probing_tx, probing_rx) = oneshot::channel();
    let (draining_tx, draining_rx) = oneshot::channel();

    // Consumers first, so the sender never blocks on a reply nobody reads.
    let receiver = tokio::spawn(sweep::run_receiver(
        resolver,
        reply_rx,
        probing_rx,
        result_tx,
        draining_tx,
    ));
    let sender = tokio::spawn(sweep::run_sender(
        prober,
        range,
        window,
        config.max_in_flight,
        reply_tx,
        probing_tx,
    ));

    let outcome = aggregate(result_rx, draining_rx, guard).await;
    if outcome.is_err() {
        sender.abort();
        receiver.abort();
    }
    let (hosts, drained) = outcome?;
    if hosts.is_empty() {
        debug!(%range, "no host answered");
    }

    let results = DiscoveryResults {
        range,
        probes_sent: drained.probes_sent,
        send_failures: drained.send_failures,
        hosts: hosts.into_vec(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        probes_sent = results.probes_sent,
        send_failures = results.send_failures,
        hosts_up = results.hosts.len(),
        elapsed_ms = results.duration_ms,
        "host discovery complete"
    );
    Ok(results)
}

/// Collect host results until the receiver reports it has drained.
async fn aggregate(
    mut result_rx: mpsc::Receiver<HostProbeResult>,
    mut draining_done: oneshot::Receiver<DrainingComplete>,
    guard: Duration,
) -> ScanResult<(HostSet, DrainingComplete)> {
    let mut hosts = HostSet::new();
    let guard_timer = tokio::time::sleep(guard);
    tokio::pin!(guard_timer);

    let drained = loop {
        tokio::select! {
            biased;
            Some(result) = result_rx.recv() => record(&mut hosts, result),
            signal = &mut draining_done => match signal {
                Ok(signal) => break signal,
                Err(_) => {
                    return Err(ScanError::Handshake(
                        "receiver stopped without signalling completion".to_string(),
                    ))
                }
            },
            _ = &mut guard_timer => {
                warn!(guard_secs = guard.as_secs_f64(), "completion handshake did not finish");
                return Err(ScanError::HandshakeTimeout(guard));
            }
        }
    };

    while let Some(result) = result_rx.recv().await {
        record(&mut hosts, result);
    }

    if drained.hosts_forwarded != hosts.len() as u64 {
        debug!(
            forwarded = drained.hosts_forwarded,
            unique = hosts.len(),
            "duplicate host results collapsed"
        );
    }
    Ok((hosts, drained))
}

fn record(hosts: &mut HostSet, result: HostProbeResult) {
    let address = result.address;
    if !hosts.insert(result) {
        debug!(%address, "duplicate reply ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies from the listed addresses after their rtt; everything else
    /// stays silent. One address may be marked as failing to send.
    struct FakeEcho {
        replies: HashMap<Ipv4Addr, Duration>,
        failing: Option<Ipv4Addr>,
        sends: AtomicUsize,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl FakeEcho {
        fn new(replies: &[(Ipv4Addr, u64)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(a, ms)| (*a, Duration::from_millis(*ms)))
                    .collect(),
                failing: None,
                sends: AtomicUsize::new(0),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_on(mut self, addr: Ipv4Addr) -> Self {
            self.failing = Some(addr);
            self
        }

        fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    /// Counts a request as in flight until its wait ends or is dropped.
    struct InFlight(Arc<AtomicUsize>);

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EchoProber for FakeEcho {
        async fn send_echo(&self, addr: Ipv4Addr) -> ScanResult<PendingEcho> {
            if self.failing == Some(addr) {
                return Err(ScanError::Socket(format!("{}: unreachable", addr)));
            }
            self.sends.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let in_flight = InFlight(Arc::clone(&self.in_flight));
            let rtt = self.replies.get(&addr).copied();
            Ok(PendingEcho::new(async move {
                let _in_flight = in_flight;
                match rtt {
                    Some(rtt) => {
                        tokio::time::sleep(rtt).await;
                        Some(rtt)
                    }
                    None => std::future::pending().await,
                }
            }))
        }
    }

    struct FakeResolver {
        names: HashMap<Ipv4Addr, String>,
        delay: Duration,
    }

    impl FakeResolver {
        fn new(names: &[(Ipv4Addr, &str)]) -> Self {
            Self {
                names: names.iter().map(|(a, n)| (*a, n.to_string())).collect(),
                delay: Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ReverseResolver for FakeResolver {
        async fn reverse(&self, addr: Ipv4Addr) -> ScanResult<Vec<String>> {
            tokio::time::sleep(self.delay).await;
            self.names
                .get(&addr)
                .map(|n| vec![n.clone()])
                .ok_or_else(|| ScanError::DnsResolution(format!("no PTR for {}", addr)))
        }
    }

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 50, last)
    }

    fn range(s: &str) -> AddressRange {
        AddressRange::parse(s).unwrap()
    }

    fn config_ms(ms: u64) -> DiscoveryConfig {
        DiscoveryConfig::new(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_silent_range_finishes_near_timeout() {
        let started = std::time::Instant::now();
        let prober = Arc::new(FakeEcho::new(&[]));
        let results = discover_hosts_with(
            range("192.168.50.0/30"),
            &DiscoveryConfig::new(Duration::from_secs(1)),
            Arc::clone(&prober),
            Arc::new(FakeResolver::new(&[])),
        )
        .await
        .unwrap();

        assert!(results.hosts.is_empty());
        assert_eq!(results.probes_sent, 4);
        assert_eq!(prober.sends(), 4);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_responsive_hosts_are_named_and_sorted() {
        let prober = FakeEcho::new(&[(addr(2), 20), (addr(1), 5)]);
        let resolver = FakeResolver::new(&[(addr(1), "router.lan")]);

        let results = discover_hosts_with(
            range("192.168.50.0/30"),
            &config_ms(300),
            Arc::new(prober),
            Arc::new(resolver),
        )
        .await
        .unwrap();

        assert_eq!(results.hosts.len(), 2);
        assert_eq!(results.hosts[0].address, addr(1));
        assert_eq!(results.hosts[0].hostnames, vec!["router.lan"]);
        assert_eq!(results.hosts[0].state, HostState::Up);
        assert_eq!(results.hosts[1].address, addr(2));
        assert_eq!(results.hosts[1].hostnames, vec![NO_HOSTNAME]);
        assert_eq!(results.hosts[1].response_time, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_slow_lookup_after_probing_is_still_reported() {
        let prober = FakeEcho::new(&[(addr(1), 5)]);
        let resolver = FakeResolver::new(&[(addr(1), "nas.lan")]).slow(Duration::from_millis(500));

        let results = discover_hosts_with(
            range("192.168.50.0/30"),
            &config_ms(100),
            Arc::new(prober),
            Arc::new(resolver),
        )
        .await
        .unwrap();

        assert_eq!(results.hosts.len(), 1);
        assert_eq!(results.hosts[0].hostnames, vec!["nas.lan"]);
    }

    #[tokio::test]
    async fn test_reply_after_deadline_is_dropped() {
        let prober = FakeEcho::new(&[(addr(1), 5), (addr(2), 2_000)]);

        let results = discover_hosts_with(
            range("192.168.50.0/30"),
            &config_ms(200),
            Arc::new(prober),
            Arc::new(FakeResolver::new(&[])),
        )
        .await
        .unwrap();

        let found: Vec<Ipv4Addr> = results.hosts.iter().map(|h| h.address).collect();
        assert_eq!(found, vec![addr(1)]);
    }

    #[tokio::test]
    async fn test_max_in_flight_is_respected() {
        let replies: Vec<(Ipv4Addr, u64)> = (0..8).map(|i| (addr(i), 20)).collect();
        let prober = Arc::new(FakeEcho::new(&replies));
        let config = config_ms(2_000).with_max_in_flight(Some(2));

        let results = discover_hosts_with(
            range("192.168.50.0/29"),
            &config,
            Arc::clone(&prober),
            Arc::new(FakeResolver::new(&[])),
        )
        .await
        .unwrap();

        assert_eq!(results.hosts.len(), 8);
        assert_eq!(prober.sends(), 8);
        assert!(prober.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_capped_sweep_reaches_host_behind_silent_ones() {
        let prober = Arc::new(FakeEcho::new(&[(addr(7), 5)]));
        let config = config_ms(300).with_max_in_flight(Some(2));

        let results = discover_hosts_with(
            range("192.168.50.0/29"),
            &config,
            Arc::clone(&prober),
            Arc::new(FakeResolver::new(&[])),
        )
        .await
        .unwrap();

        let found: Vec<Ipv4Addr> = results.hosts.iter().map(|h| h.address).collect();
        assert_eq!(found, vec![addr(7)]);
        assert_eq!(results.probes_sent, 8);
        assert_eq!(prober.sends(), 8);
    }

    #[tokio::test]
    async fn test_every_address_gets_one_request() {
        let prober = Arc::new(FakeEcho::new(&[]));
        let targets = range("198.18.0.0/22");

        let results = discover_hosts_with(
            targets,
            &config_ms(200),
            Arc::clone(&prober),
            Arc::new(FakeResolver::new(&[])),
        )
        .await
        .unwrap();

        assert_eq!(prober.sends() as u64, targets.len());
        assert_eq!(results.probes_sent, 1024);
        assert_eq!(results.send_failures, 0);
    }

    #[tokio::test]
    async fn test_huge_timeout_does_not_overflow() {
        let forever = DiscoveryConfig::new(Duration::from_secs(u64::MAX));

        for config in [forever.clone(), forever.with_max_in_flight(Some(1))] {
            let results = discover_hosts_with(
                range("192.168.50.1/32"),
                &config,
                Arc::new(FakeEcho::new(&[(addr(1), 5)])),
                Arc::new(FakeResolver::new(&[])),
            )
            .await
            .unwrap();
            assert_eq!(results.hosts.len(), 1);
        }
    }

    #[test]
    fn test_handshake_guard_scales_with_rounds() {
        let config = DiscoveryConfig::new(Duration::from_secs(1));
        assert_eq!(config.handshake_guard(256), Duration::from_secs(1) + HANDSHAKE_GRACE);

        let capped = config.with_max_in_flight(Some(100));
        assert_eq!(capped.handshake_guard(256), Duration::from_secs(3) + HANDSHAKE_GRACE);
        assert_eq!(capped.handshake_guard(0), Duration::from_secs(1) + HANDSHAKE_GRACE);

        let huge = DiscoveryConfig::new(Duration::MAX).with_max_in_flight(Some(1));
        assert_eq!(huge.handshake_guard(1 << 32), Duration::MAX);
    }

    #[tokio::test]
    async fn test_unsent_request_is_not_counted() {
        let prober = FakeEcho::new(&[(addr(1), 5), (addr(3), 5)]).failing_on(addr(2));

        let results = discover_hosts_with(
            range("192.168.50.0/30"),
            &config_ms(200),
            Arc::new(prober),
            Arc::new(FakeResolver::new(&[])),
        )
        .await
        .unwrap();

        let found: Vec<Ipv4Addr> = results.hosts.iter().map(|h| h.address).collect();
        assert_eq!(found, vec![addr(1), addr(3)]);
        assert_eq!(results.probes_sent, 3);
        assert_eq!(results.send_failures, 1);
    }

    #[tokio::test]
    async fn test_zero_timeout_is_rejected() {
        let result = discover_hosts_with(
            range("192.168.50.0/30"),
            &DiscoveryConfig::new(Duration::ZERO),
            Arc::new(FakeEcho::new(&[])),
            Arc::new(FakeResolver::new(&[])),
        )
        .await;
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));

        let result = discover_hosts("192.168.50.0/30", 0).await;
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_invalid_range_is_rejected() {
        let result = discover_hosts("192.168.50.0/40", 1).await;
        assert!(matches!(result, Err(ScanError::InvalidRange(_))));
    }

    #[tokio::test]
    async fn test_dropped_draining_signal_is_an_error() {
        let (_result_tx, result_rx) = mpsc::channel(1);
        let (draining_tx, draining_rx) = oneshot::channel();
        drop(draining_tx);

        let result = aggregate(result_rx, draining_rx, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ScanError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_stalled_handshake_hits_guard_timer() {
        let (_result_tx, result_rx) = mpsc::channel(1);
        let (_draining_tx, draining_rx) = oneshot::channel();

        let result = aggregate(result_rx, draining_rx, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ScanError::HandshakeTimeout(_))));
    }

    #[test]
    fn test_host_result_json_shape() {
        let host = HostProbeResult {
            address: addr(7),
            state: HostState::Up,
            hostnames: vec!["N/A".to_string()],
            response_time: Duration::from_micros(1500),
        };
        let json = serde_json::to_value(&host).unwrap();
        assert_eq!(json["address"], "192.168.50.7");
        assert_eq!(json["state"], "up");
        assert_eq!(json["response_time_ms"], 1.5);
    }
}
