//! Port probe engine.
//!
//! Runs one TCP connect attempt per port of an interval, never more than
//! [`SANITY_LIMIT`] at a time, and returns exactly one result per port,
//! sorted by port.
//!
//! Data flow: the issuing loop acquires a permit, spawns an attempt, the
//! attempt releases its permit as soon as the connect resolves and sends its
//! result to a collector task. The collector is spawned first and hands the
//! complete list back once it has received every expected result.

pub mod tcp;
pub mod traits;

use crate::aggregate::sort_port_results;
use crate::error::{ScanError, ScanResult};
use crate::types::{PortInterval, ScanTarget};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info};

pub use tcp::TcpConnectProber;
pub use traits::{PortProbeResult, PortProber, PortState, Protocol};

/// Hard ceiling on concurrently outstanding connect attempts. Going much
/// higher turns a scan into an accidental flood of the target.
pub const SANITY_LIMIT: usize = 50;

/// Timeout for a single connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning for a port scan.
#[derive(Debug, Clone)]
pub struct PortScanConfig {
    /// Concurrent attempts, between 1 and [`SANITY_LIMIT`].
    pub concurrency: usize,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for PortScanConfig {
    fn default() -> Self {
        Self {
            concurrency: SANITY_LIMIT,
            timeout: CONNECT_TIMEOUT,
        }
    }
}

impl PortScanConfig {
    /// Set the concurrency, clamped to `1..=SANITY_LIMIT`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, SANITY_LIMIT);
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Scan `start..=end` on `host` with TCP connects.
///
/// Blocks (asynchronously) until every port has been classified. Connect
/// failures are reported as [`PortState::Closed`]; only an invalid interval
/// or an unresolvable host fail the scan.
pub async fn scan_ports(host: &str, start: u16, end: u16) -> ScanResult<Vec<PortProbeResult>> {
    scan_ports_configured(host, start, end, &PortScanConfig::default()).await
}

/// [`scan_ports`] with explicit tuning.
pub async fn scan_ports_configured(
    host: &str,
    start: u16,
    end: u16,
    config: &PortScanConfig,
) -> ScanResult<Vec<PortProbeResult>> {
    let interval = PortInterval::new(start, end)?;
    let target = ScanTarget::resolve(host).await?;
    info!(%target, %interval, "starting port scan");

    let prober = Arc::new(TcpConnectProber::new(target.ip, config.timeout));
    scan_ports_with(prober, interval, config).await
}

/// Drive `prober` over `interval` under the permit pool.
pub async fn scan_ports_with<P>(
    prober: Arc<P>,
    interval: PortInterval,
    config: &PortScanConfig,
) -> ScanResult<Vec<PortProbeResult>>
where
    P: PortProber + ?Sized + 'static,
{
    let start_time = Instant::now();
    let expected = interval.len();
    let concurrency = config.concurrency.clamp(1, SANITY_LIMIT);
    debug!(
        first = interval.start(),
        last = interval.end(),
        concurrency,
        "dispatching connect attempts"
    );

    let permits = Arc::new(Semaphore::new(concurrency));
    let (result_tx, result_rx) = mpsc::channel::<PortProbeResult>(concurrency);
    let (collected_tx, collected_rx) = oneshot::channel();

    // The collector must be consuming before the first attempt can send.
    tokio::spawn(collect_results(expected, result_rx, collected_tx));

    for port in interval.iter() {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|_| ScanError::Handshake("permit pool closed".to_string()))?;
        let prober = Arc::clone(&prober);
        let result_tx = result_tx.clone();

        tokio::spawn(async move {
            let state = prober.probe(port).await;
            drop(permit);

            debug!(port, %state, "port probed");
            let _ = result_tx
                .send(PortProbeResult::new(port, state, prober.protocol()))
                .await;
        });
    }
    drop(result_tx);

    let mut results = collected_rx
        .await
        .map_err(|_| ScanError::Handshake("port collector exited early".to_string()))?;

    if results.len() != expected {
        return Err(ScanError::Handshake(format!(
            "collected {} of {} port results",
            results.len(),
            expected
        )));
    }

    sort_port_results(&mut results);

    let open = results.iter().filter(|r| r.is_open()).count();
    info!(
        ports = expected,
        open,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "port scan complete"
    );

    Ok(results)
}

/// Receive exactly `expected` results, or fewer if every sender is gone.
async fn collect_results(
    expected: usize,
    mut results_rx: mpsc::Receiver<PortProbeResult>,
    collected_tx: oneshot::Sender<Vec<PortProbeResult>>,
) {
    let mut results = Vec::with_capacity(expected);
    while results.len() < expected {
        match results_rx.recv().await {
            Some(result) => results.push(result),
            None => break,
        }
    }
    let _ = collected_tx.send(results);
}
