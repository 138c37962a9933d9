//! Sender and receiver tasks of the host sweep.
//!
//! ```text
//!   sender ──EchoReply──▶ receiver ──HostProbeResult──▶ aggregator
//!     │                     ▲   │                           ▲
//!     └──ProbingComplete────┘   └────DrainingComplete───────┘
//! ```
//!
//! The sender drops its reply channel before firing `ProbingComplete`, so
//! once the receiver sees that signal every reply it will ever get is
//! already queued. The receiver fires `DrainingComplete` only after those
//! replies are enriched and forwarded.

use super::icmp::{EchoProber, PendingEcho};
use super::resolve::{hostnames_for, ReverseResolver};
use super::{HostProbeResult, HostState};
use crate::types::AddressRange;
use futures::stream::{self, FuturesUnordered, StreamExt};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, trace, warn};

/// A reply seen by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub address: Ipv4Addr,
    pub rtt: Duration,
}

/// Fired once by the sender after every request has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbingComplete {
    /// Echo requests that went out.
    pub probes_sent: u64,
    /// Addresses whose request could not be sent.
    pub send_failures: u64,
}

/// Fired once by the receiver after every queued reply has been forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainingComplete {
    pub probes_sent: u64,
    pub send_failures: u64,
    pub hosts_forwarded: u64,
}

/// How long a request may wait for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyWindow {
    /// Every reply must arrive before one sweep-wide deadline.
    Shared(Instant),
    /// Each reply has this long, counted from its own request.
    PerRequest(Duration),
}

impl ReplyWindow {
    async fn wait(self, pending: PendingEcho) -> Option<Duration> {
        let reply = match self {
            Self::Shared(deadline) => timeout_at(deadline, pending.reply()).await,
            Self::PerRequest(window) => timeout(window, pending.reply()).await,
        };
        reply.ok().flatten()
    }
}

/// Send an echo request to every address of `range` and forward replies
/// that arrive within `window`.
///
/// `max_in_flight = None` starts every request at once.
pub async fn run_sender<E>(
    prober: Arc<E>,
    range: AddressRange,
    window: ReplyWindow,
    max_in_flight: Option<usize>,
    reply_tx: mpsc::Sender<EchoReply>,
    probing_done: oneshot::Sender<ProbingComplete>,
) where
    E: EchoProber + ?Sized + 'static,
{
    let (probes_sent, send_failures) = stream::iter(range)
        .map(|address| {
            let prober = Arc::clone(&prober);
            let reply_tx = reply_tx.clone();
            async move { echo_one(prober.as_ref(), address, window, &reply_tx).await }
        })
        .buffer_unordered(max_in_flight.unwrap_or(usize::MAX))
        .fold((0u64, 0u64), |(sent, failed), was_sent| async move {
            if was_sent {
                (sent + 1, failed)
            } else {
                (sent, failed + 1)
            }
        })
        .await;

    drop(reply_tx);
    info!(probes_sent, send_failures, "probing complete");
    let _ = probing_done.send(ProbingComplete {
        probes_sent,
        send_failures,
    });
}

/// One address: send, wait within `window`, pass on any reply. Returns
/// whether the request went out.
async fn echo_one<E>(
    prober: &E,
    address: Ipv4Addr,
    window: ReplyWindow,
    reply_tx: &mpsc::Sender<EchoReply>,
) -> bool
where
    E: EchoProber + ?Sized,
{
    let pending = match prober.send_echo(address).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(%address, error = %e, "echo request not sent");
            return false;
        }
    };

    match window.wait(pending).await {
        Some(rtt) => {
            debug!(%address, rtt_ms = rtt.as_secs_f64() * 1000.0, "echo reply");
            if reply_tx.send(EchoReply { address, rtt }).await.is_err() {
                warn!(%address, "receiver gone, reply dropped");
            }
        }
        None => trace!(%address, "no reply within window"),
    }
    true
}

/// Enrich replies with host names and forward them until drained.
pub async fn run_receiver<R>(
    resolver: Arc<R>,
    mut reply_rx: mpsc::Receiver<EchoReply>,
    mut probing_done: oneshot::Receiver<ProbingComplete>,
    result_tx: mpsc::Sender<HostProbeResult>,
    draining_done: oneshot::Sender<DrainingComplete>,
) where
    R: ReverseResolver + ?Sized + 'static,
{
    let mut lookups = FuturesUnordered::new();
    let mut forwarded = 0u64;

    let probing = loop {
        tokio::select! {
            biased;
            Some(result) = lookups.next(), if !lookups.is_empty() => {
                forwarded += forward(&result_tx, result).await;
            }
            Some(reply) = reply_rx.recv() => {
                lookups.push(enrich(Arc::clone(&resolver), reply));
            }
            signal = &mut probing_done => break signal,
        }
    };

    let probing = match probing {
        Ok(signal) => signal,
        Err(_) => {
            warn!("sender stopped without signalling completion");
            return;
        }
    };

    while let Some(reply) = reply_rx.recv().await {
        lookups.push(enrich(Arc::clone(&resolver), reply));
    }
    while let Some(result) = lookups.next().await {
        forwarded += forward(&result_tx, result).await;
    }

    debug!(hosts = forwarded, "receiver drained");
    let _ = draining_done.send(DrainingComplete {
        probes_sent: probing.probes_sent,
        send_failures: probing.send_failures,
        hosts_forwarded: forwarded,
    });
}

async fn enrich<R>(resolver: Arc<R>, reply: EchoReply) -> HostProbeResult
where
    R: ReverseResolver + ?Sized,
{
    let hostnames = hostnames_for(resolver.as_ref(), reply.address).await;
    HostProbeResult {
        address: reply.address,
        state: HostState::Up,
        hostnames,
        response_time: reply.rtt,
    }
}

async fn forward(result_tx: &mpsc::Sender<HostProbeResult>, result: HostProbeResult) -> u64 {
    let address = result.address;
    match result_tx.send(result).await {
        Ok(()) => 1,
        Err(_) => {
            warn!(%address, "aggregator gone, result dropped");
            0
        }
    }
}
